//! Log sink on the firmware text console

use crate::SimpleTextOutputProtocol;
use abboot_core::logger::LogSink;
use log::Level;

const CHUNK: usize = 128;

pub struct Console {
    out: *mut SimpleTextOutputProtocol,
}

// Boot services run on a single processor
unsafe impl Send for Console {}

impl Console {
    pub fn new(out: *mut SimpleTextOutputProtocol) -> Self {
        Self { out }
    }

    /// Write `text` followed by CRLF
    pub fn print_line(&mut self, text: &str) {
        self.write_str(text);
        self.write_str("\r\n");
    }

    fn write_str(&mut self, text: &str) {
        if self.out.is_null() {
            return;
        }

        // UCS-2 in fixed chunks, each NUL-terminated
        let mut buf = [0u16; CHUNK + 1];
        let mut len = 0;
        for unit in text.encode_utf16() {
            buf[len] = unit;
            len += 1;
            if len == CHUNK {
                self.flush(&mut buf, len);
                len = 0;
            }
        }
        if len > 0 {
            self.flush(&mut buf, len);
        }
    }

    fn flush(&mut self, buf: &mut [u16; CHUNK + 1], len: usize) {
        buf[len] = 0;
        // SAFETY: `out` is the firmware's ConOut, valid while boot services are
        unsafe {
            ((*self.out).output_string)(self.out, buf.as_ptr());
        }
    }
}

impl LogSink for Console {
    fn write_line(&mut self, level: Level, line: &str) {
        if level <= Level::Info {
            self.print_line(line);
        }
    }
}
