pub mod app_config;
pub mod beans;
pub mod config;
pub mod error;
pub mod schedule;
pub mod selector;

pub use app_config::{AppConfig, Environment};
pub use beans::{
    load_seed_file, validate_bean_update, validate_cost, validate_new_bean, BeanUpdate, NewBean,
    PLACEHOLDER_IMAGE_URL,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, ValidationError};
pub use schedule::{compute_delay, delay_until_next_local_midnight, next_midnight};
pub use selector::{plan_selection, Candidate, SelectionOutcome, SelectionPlan};
