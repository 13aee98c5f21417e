// crate::io
use std::io::{Read, Result, Write};

// Raw 4-byte magic/version tags prepended to versioned containers.
pub fn write_magic(w: &mut dyn Write, magic: &[u8; 4]) -> Result<()> {
    w.write_all(magic)
}

// Reads 4 bytes and compares; a mismatch is a load failure, not a panic.
pub fn check_magic(r: &mut dyn Read, magic: &[u8; 4]) -> bool {
    let mut buf = [0u8; 4];
    if r.read_exact(&mut buf).is_err() {
        return false;
    }
    buf == *magic
}
