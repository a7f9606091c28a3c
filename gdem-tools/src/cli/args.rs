pub use clap::{App, Arg};
pub use inflector::Inflector;

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::args::App::new($name).version(clap::crate_version!())
    }};
}

/// A long option. Long names keep the snake_case the original tool
/// shipped with (`--max_lod`, not `--max-lod`).
#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use inflector::Inflector;
        $crate::cli::args::Arg::with_name($name)
            .long(&$name.to_snake_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// A boolean flag.
#[macro_export]
macro_rules! flag {
    ($name:expr) => {{
        use inflector::Inflector;
        $crate::cli::args::Arg::with_name($name).long(&$name.to_snake_case())
    }};
}
