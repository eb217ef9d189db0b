use serde::Serialize;

use crate::client::CtlError;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CtlError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| CtlError::Server(format!("failed to render output: {e}")))?;
    println!("{out}");
    Ok(())
}
