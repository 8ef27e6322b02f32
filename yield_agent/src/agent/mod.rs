pub(crate) mod cycle;
pub(crate) mod dashboard;
pub(crate) mod lock;
pub(crate) mod rates;
pub(crate) mod run;
pub(crate) mod settings;
pub(crate) mod submitter;
