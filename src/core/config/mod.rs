pub mod data;
pub mod io;
pub mod printing;


pub use data::{path_display, Config, ConfigOverrides, ResolvedConfig};
pub use io::{data_dir, ConfigError};
