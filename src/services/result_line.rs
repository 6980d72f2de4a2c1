use thiserror::Error;

/// Marker the bot prints when it wants a result recorded
pub const RESULT_MARKER: &str = "API-RESULT";

/// A result line of the form `API-RESULT|<item name>|<amount>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLine {
    pub item_name: String,
    pub amount: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultLineError {
    #[error("Invalid request format of {0}.")]
    InvalidFieldCount(usize),

    #[error("Invalid type for item amount.")]
    InvalidAmount,
}

/// Whether a line asks for a statistics report.
pub fn is_result_line(line: &str) -> bool {
    line.contains(RESULT_MARKER)
}

/// Parse `API-RESULT|<item name>|<amount>`.
///
/// The line must split into exactly three `|`-separated fields and the third
/// must be an integer (surrounding whitespace, such as a trailing `\r`, is
/// ignored). The first field is not inspected, so a log prefix in front of
/// the marker is accepted.
pub fn parse_result_line(line: &str) -> Result<ResultLine, ResultLineError> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != 3 {
        return Err(ResultLineError::InvalidFieldCount(fields.len()));
    }

    let amount = fields[2]
        .trim()
        .parse::<i64>()
        .map_err(|_| ResultLineError::InvalidAmount)?;

    Ok(ResultLine {
        item_name: fields[1].to_string(),
        amount,
    })
}
