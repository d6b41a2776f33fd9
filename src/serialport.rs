pub const LINE_CAPACITY: usize = 64;

pub type Line = heapless::String<LINE_CAPACITY>;

/// Reassembles newline-terminated lines from the arbitrary chunks a serial or
/// USB link delivers.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Line,
    discarding: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buffer: Line::new(),
            discarding: false,
        }
    }

    /// Accepts one byte, returning a line when `byte` completes it. Lines that
    /// overflow or carry non-ASCII bytes are dropped whole.
    pub fn push(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\n' => {
                let line = core::mem::take(&mut self.buffer);
                if core::mem::take(&mut self.discarding) {
                    log::warn!("dropped malformed line");
                    return None;
                }
                Some(line)
            }
            b'\r' => None,
            _ if self.discarding => None,
            _ => {
                if !byte.is_ascii() || self.buffer.push(byte as char).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                }
                None
            }
        }
    }

    pub fn feed<'a>(&'a mut self, data: &'a [u8]) -> impl Iterator<Item = Line> + 'a {
        data.iter().filter_map(move |&byte| self.push(byte))
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }
}
