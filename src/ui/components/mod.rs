mod command_input;
mod confirm;
mod form;
mod input;
mod key_result;
mod option_picker;
mod search_input;
mod toasts;

pub use command_input::{CommandEvent, CommandInput};
pub use confirm::{ConfirmDialog, ConfirmEvent};
pub use form::{EntityForm, FormEvent, Submission};
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
pub use option_picker::{OptionPicker, PickerEvent, PickerOption};
pub use search_input::{SearchEvent, SearchInput};
pub use toasts::{Notice, NoticeLevel, Toasts};

use ratatui::prelude::Rect;

/// A `width` x `height` rectangle centered in `area`, clipped to it
fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}
