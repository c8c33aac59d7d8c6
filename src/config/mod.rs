//! 配置管理模块
//!
//! 提供配置文件解析、环境变量替换和验证功能

pub mod loader;
pub mod types;

// 重新导出主要类型
pub use loader::{
    apply_env_overrides, generate_default_config, get_default_config_path, ConfigLoader,
    TomlConfigLoader, TRIGGER_SECRET_ENV,
};
pub use types::{
    validate_config, AlertConfig, Config, EndpointSeed, GlobalConfig, StorageBackend,
    StorageConfig, WebConfig,
};
