pub mod controller;
pub mod notice;
pub mod widgets;

pub use controller::{CompletionCallback, ExerciseViewController, Phase, ViewError};
pub use notice::{Notice, NoticeKind, NoticeLevel};
pub use widgets::{render_attempt, render_result, InputError, Widget};
