use crate::types::{Fdflags, Fdstat, Filestat, Filetype, Rights};

type RawSink = Box<dyn FnMut(&[u8]) + Send>;
type LineSink = Box<dyn FnMut(&str) + Send>;

enum Sink {
    Raw(RawSink),
    Lines {
        callback: LineSink,
        // Bytes of an incomplete UTF-8 sequence cut off by the last write.
        undecoded: Vec<u8>,
        // Decoded text after the last newline.
        line: String,
    },
}

/// Write-only console device backed by a host callback.
pub struct ConsoleStdout {
    sink: Sink,
}

impl ConsoleStdout {
    /// Hands every written chunk to `callback` as is.
    pub fn new(callback: impl FnMut(&[u8]) + Send + 'static) -> Self {
        Self {
            sink: Sink::Raw(Box::new(callback)),
        }
    }

    /// Decodes output as UTF-8 and calls `callback` once per complete line,
    /// without the trailing `\n`. Invalid sequences become U+FFFD, and a
    /// sequence split across writes is decoded once it is complete.
    pub fn line_buffered(callback: impl FnMut(&str) + Send + 'static) -> Self {
        Self {
            sink: Sink::Lines {
                callback: Box::new(callback),
                undecoded: Vec::new(),
                line: String::new(),
            },
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> usize {
        match &mut self.sink {
            Sink::Raw(callback) => callback(bytes),
            Sink::Lines {
                callback,
                undecoded,
                line,
            } => {
                undecoded.extend_from_slice(bytes);
                let consumed = decode_lossy(undecoded, line);
                undecoded.drain(..consumed);

                while let Some(newline) = line.find('\n') {
                    let rest = line.split_off(newline + 1);
                    let mut complete = std::mem::replace(line, rest);
                    complete.pop();
                    callback(&complete);
                }
            }
        }
        bytes.len()
    }

    pub fn fdstat(&self) -> Fdstat {
        Fdstat {
            fs_filetype: Filetype::CharacterDevice,
            fs_flags: Fdflags::empty(),
            fs_rights_base: Rights::FD_WRITE,
            fs_rights_inheriting: Rights::empty(),
        }
    }

    pub fn stat(&self) -> Filestat {
        Filestat {
            st_dev: 0,
            st_ino: 0,
            st_filetype: Filetype::CharacterDevice,
            st_nlink: 1,
            st_size: 0,
            st_atim: 0,
            st_mtim: 0,
            st_ctim: 0,
        }
    }
}

/// Appends the decodable prefix of `bytes` to `out`, replacing invalid
/// sequences. Returns how many bytes were consumed; an incomplete sequence
/// at the very end is left for the next call.
fn decode_lossy(bytes: &[u8], out: &mut String) -> usize {
    let mut pos = 0;
    while pos < bytes.len() {
        match std::str::from_utf8(&bytes[pos..]) {
            Ok(valid) => {
                out.push_str(valid);
                pos = bytes.len();
            }
            Err(err) => {
                let valid_end = pos + err.valid_up_to();
                if let Ok(valid) = std::str::from_utf8(&bytes[pos..valid_end]) {
                    out.push_str(valid);
                }
                match err.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pos = valid_end + len;
                    }
                    None => return valid_end,
                }
            }
        }
    }
    pos
}

impl std::fmt::Debug for ConsoleStdout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sink {
            Sink::Raw(_) => f.debug_struct("ConsoleStdout").field("mode", &"raw").finish(),
            Sink::Lines {
                undecoded, line, ..
            } => f
                .debug_struct("ConsoleStdout")
                .field("mode", &"lines")
                .field("pending", &(undecoded.len() + line.len()))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn capture() -> (ConsoleStdout, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let console = ConsoleStdout::line_buffered(move |line| {
            sink.lock().unwrap().push(line.to_string());
        });
        (console, lines)
    }

    #[test]
    fn raw_passes_bytes_through() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut console = ConsoleStdout::new(move |bytes| {
            sink.lock().unwrap().extend_from_slice(bytes);
        });
        assert_eq!(console.write(b"\xffab"), 3);
        assert_eq!(*seen.lock().unwrap(), b"\xffab".to_vec());
    }

    #[test]
    fn one_callback_per_line() {
        let (mut console, lines) = capture();
        console.write(b"one\ntwo\nthr");
        assert_eq!(*lines.lock().unwrap(), vec!["one", "two"]);
        console.write(b"ee\n");
        assert_eq!(*lines.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn multibyte_sequence_split_across_writes() {
        let (mut console, lines) = capture();
        let snowman = "☃".as_bytes();
        console.write(&snowman[..1]);
        console.write(&snowman[1..]);
        console.write(b"\n");
        assert_eq!(*lines.lock().unwrap(), vec!["☃"]);
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let (mut console, lines) = capture();
        console.write(b"a\xffb\n");
        assert_eq!(*lines.lock().unwrap(), vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn empty_lines_are_reported() {
        let (mut console, lines) = capture();
        console.write(b"\n\n");
        assert_eq!(*lines.lock().unwrap(), vec!["", ""]);
    }
}
