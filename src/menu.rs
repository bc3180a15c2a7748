use std::io::{BufRead, Write};

use crate::error::PplxError;
use crate::model::SupportedModel;

/// Prints the model menu once and maps a single line of input to a model.
pub fn select_model(
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<SupportedModel, PplxError> {
    writeln!(output, "Select a model:")?;
    for (idx, model) in SupportedModel::ALL.iter().enumerate() {
        writeln!(output, "{}. {}", idx + 1, model)?;
    }
    write!(output, "Enter your choice (1, 2, or 3): ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    SupportedModel::from_menu_choice(&line)
}
