//! Copying message text out of the terminal.

/// Where copied text ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDestination {
    /// The system clipboard.
    Clipboard,
    /// Printed to stdout for the terminal's own selection.
    Printed,
}

/// Places `text` on the system clipboard.
#[cfg(feature = "clipboard")]
pub fn copy_text(text: &str) -> Result<CopyDestination, String> {
    let mut clipboard = arboard::Clipboard::new().map_err(|err| err.to_string())?;
    clipboard
        .set_text(text.to_string())
        .map_err(|err| err.to_string())?;
    Ok(CopyDestination::Clipboard)
}

/// Prints `text` raw; built without the `clipboard` feature.
#[cfg(not(feature = "clipboard"))]
pub fn copy_text(text: &str) -> Result<CopyDestination, String> {
    println!("{text}");
    Ok(CopyDestination::Printed)
}
