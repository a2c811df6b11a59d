//! Progress bar
//!
//! `Processing Assets: n/total` on stderr while the pool drains.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub const PROGRESS_MESSAGE: &str = "Processing Assets";

const TEMPLATE: &str = "{msg}: {percent:>3}%|{bar:40.cyan/blue}| {pos}/{len} [{elapsed_precise}]";

/// Bar over `total` tasks; never drawn unless `visible`
pub fn progress_bar(total: usize, visible: bool) -> Result<ProgressBar> {
    let style = ProgressStyle::default_bar()
        .template(TEMPLATE)
        .context("Invalid progress bar template")?
        .progress_chars("#>-");

    let target = if visible {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };

    let bar = ProgressBar::with_draw_target(Some(total as u64), target)
        .with_style(style)
        .with_message(PROGRESS_MESSAGE);
    Ok(bar)
}
