use dtmap_core::error::DtmapError;
use serde::Serialize;

pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<(), DtmapError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
