//! Concrete `Action` implementations, one module per action name (§4.1/§4.9).
//! Registered into the per-payload `ActionFactory`s assembled by `container`.

pub mod check_duplicates;
pub mod clean_html;
pub mod format_instruction_line;
pub mod mark_note_worker_completed;
pub mod parse_html;
pub mod parse_ingredient_line;
pub mod process_image;
pub mod process_source;
pub mod save_instruction_line;
pub mod save_note;
pub mod track_pattern;
pub mod wait_for_categorization;
