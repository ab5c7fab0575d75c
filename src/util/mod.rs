use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};

pub fn new_progress_spinner() -> ProgressBar {
    ProgressBar::new_spinner()
        .with_style(
            ProgressStyle::with_template("{spinner} {pos} folders {elapsed_precise} {wide_msg}")
                .unwrap()
                .tick_strings(&[
                    // Idea from https://github.com/FGRibreau/spinners/blob/master/src/lib.rs
                    "🌑", "🌒", "🌓", "🌔", "🌕", "🌖", "🌗", "🌘",
                ]),
        )
        .with_finish(ProgressFinish::AndClear)
}
