//! Command-line interface components
//!
//! This module contains CLI-specific code for the DBM samples, including
//! argument parsing, command handlers, and signal handling.

pub mod args;
pub mod commands;
pub mod signals;

pub use args::{
    Cli, Commands, CreateAndRunQueryArgs, DownloadLineItemsArgs, GetLatestReportArgs, GlobalArgs,
    UploadLineItemsArgs,
};
pub use commands::{
    connect, handle_create_and_run_query, handle_download_line_items, handle_get_latest_report,
    handle_list_queries, handle_upload_line_items,
};
pub use signals::spawn_signal_listener;
