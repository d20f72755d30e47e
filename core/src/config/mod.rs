mod load;
mod types;

pub use load::{get_quill_data_dir, load_default, load_from_path};
pub use types::{
    ClusterDefaults, ExecutorConfig, LoggingConfig, QuillConfig, RetryConfig, TracerConfig,
};
