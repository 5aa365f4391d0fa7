//! Configuration: types, default paths, XML loading, route-table assembly.

pub mod build;
pub mod paths;
pub mod types;
pub mod xml;

pub use build::build_route_table;
pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, DestinationConfig, FilterConfig, LogLevel, RouteConfig};
pub use xml::{create_template_config, load_config};

/// Fallback source directory when neither config nor CLI provide one.
pub const SOURCE_BASE_DEFAULT: &str = "/mnt/files/incoming";

/// Default depth for the candidate scan under the source base.
pub const SCAN_DEPTH_DEFAULT: usize = 4;
