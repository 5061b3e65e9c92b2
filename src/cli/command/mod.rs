pub mod compare;

use std::path::PathBuf;

use chrono::{Datelike, Local};
pub use compare::compare;

pub fn make_plot_file_name(reach_id: i64) -> PathBuf {
    let today = Local::now();
    let file_name = format!(
        "streamflow-{}-{}-{:02}-{:02}.png",
        reach_id,
        today.year(),
        today.month(),
        today.day()
    );

    dirs::home_dir().unwrap_or_default().join(file_name)
}
