//! File-backed byte/character streams.
//!
//! A stream wraps an OS file handle plus `(name, mode)` metadata and an
//! open flag. The three standard streams are "external": closing them
//! only clears the flag, the underlying handle stays open. Memory
//! streams back the captured standard output of embedded machines.

use std::fs::OpenOptions;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

/// Where the bytes come from and go to.
#[derive(Debug)]
pub enum StreamTarget {
    /// Regular file.
    File(std::fs::File),
    /// Process standard input.
    Stdin,
    /// Process standard output.
    Stdout,
    /// Process standard error.
    Stderr,
    /// In-memory buffer.
    Memory(Cursor<Vec<u8>>),
    /// Closed; every operation fails.
    Closed,
}

/// Seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start.
    Set,
    /// From the current position.
    Cur,
    /// From the end.
    End,
}

/// An open stream.
#[derive(Debug)]
pub struct Stream {
    /// Display name.
    pub name: String,
    /// Mode string the stream was opened with.
    pub mode: String,
    /// Whether operations are currently allowed.
    pub open: bool,
    /// External streams never close their OS handle.
    pub external: bool,
    target: StreamTarget,
}

impl Stream {
    /// Open a file with a C-style mode string (`r`, `w`, `a`, with `+`
    /// and/or `b` suffixes).
    pub fn open(name: &str, mode: &str) -> io::Result<Stream> {
        let mut opts = OpenOptions::new();
        match mode.trim_end_matches(['b', '+']) {
            "r" => {
                opts.read(true);
            }
            "w" => {
                opts.write(true).create(true).truncate(true);
            }
            "a" => {
                opts.append(true).create(true);
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid mode '{mode}'"),
                ))
            }
        }
        if mode.contains('+') {
            opts.read(true).write(true);
        }
        Ok(Stream {
            name: name.to_owned(),
            mode: mode.to_owned(),
            open: true,
            external: false,
            target: StreamTarget::File(opts.open(name)?),
        })
    }

    fn external(name: &str, mode: &str, target: StreamTarget) -> Stream {
        Stream {
            name: name.to_owned(),
            mode: mode.to_owned(),
            open: true,
            external: true,
            target,
        }
    }

    /// Wrapper around process stdin.
    pub fn stdin() -> Stream {
        Stream::external("<stdin>", "r", StreamTarget::Stdin)
    }

    /// Wrapper around process stdout.
    pub fn stdout() -> Stream {
        Stream::external("<stdout>", "w", StreamTarget::Stdout)
    }

    /// Wrapper around process stderr.
    pub fn stderr() -> Stream {
        Stream::external("<stderr>", "w", StreamTarget::Stderr)
    }

    /// Growable in-memory stream.
    pub fn memory() -> Stream {
        Stream {
            name: "<memory>".to_owned(),
            mode: "r+".to_owned(),
            open: true,
            external: false,
            target: StreamTarget::Memory(Cursor::new(Vec::new())),
        }
    }

    fn check_open(&self) -> io::Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::Other, "stream is closed"))
        }
    }

    /// Read up to `n` bytes (or to end-of-stream when `n` is `None`).
    pub fn read(&mut self, n: Option<usize>) -> io::Result<Vec<u8>> {
        self.check_open()?;
        let mut out = Vec::new();
        match (&mut self.target, n) {
            (StreamTarget::File(f), Some(n)) => {
                out.resize(n, 0);
                let got = read_up_to(f, &mut out)?;
                out.truncate(got);
            }
            (StreamTarget::File(f), None) => {
                f.read_to_end(&mut out)?;
            }
            (StreamTarget::Memory(m), Some(n)) => {
                out.resize(n, 0);
                let got = read_up_to(m, &mut out)?;
                out.truncate(got);
            }
            (StreamTarget::Memory(m), None) => {
                m.read_to_end(&mut out)?;
            }
            (StreamTarget::Stdin, Some(n)) => {
                out.resize(n, 0);
                let got = read_up_to(&mut io::stdin().lock(), &mut out)?;
                out.truncate(got);
            }
            (StreamTarget::Stdin, None) => {
                io::stdin().lock().read_to_end(&mut out)?;
            }
            _ => return Err(io::Error::new(io::ErrorKind::Other, "stream is not readable")),
        }
        Ok(out)
    }

    /// Read up to `n` UTF-8 code points.
    pub fn read_chars(&mut self, n: usize) -> io::Result<String> {
        self.check_open()?;
        let mut out = Vec::new();
        for _ in 0..n {
            let mut first = [0u8; 1];
            if self.read_exact_opt(&mut first)? == 0 {
                break;
            }
            out.push(first[0]);
            let extra = match first[0] {
                b if b & 0b1000_0000 == 0 => 0,
                b if b & 0b1110_0000 == 0b1100_0000 => 1,
                b if b & 0b1111_0000 == 0b1110_0000 => 2,
                b if b & 0b1111_1000 == 0b1111_0000 => 3,
                _ => 0,
            };
            if extra > 0 {
                let mut rest = vec![0u8; extra];
                let got = self.read_exact_opt(&mut rest)?;
                out.extend_from_slice(&rest[..got]);
            }
        }
        String::from_utf8(out)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 in stream"))
    }

    fn read_exact_opt(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.target {
            StreamTarget::File(f) => read_up_to(f, buf),
            StreamTarget::Memory(m) => read_up_to(m, buf),
            StreamTarget::Stdin => read_up_to(&mut io::stdin().lock(), buf),
            _ => Err(io::Error::new(io::ErrorKind::Other, "stream is not readable")),
        }
    }

    /// Write all of `data`; returns the byte count.
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        match &mut self.target {
            StreamTarget::File(f) => f.write_all(data)?,
            StreamTarget::Memory(m) => m.write_all(data)?,
            StreamTarget::Stdout => {
                let mut h = io::stdout().lock();
                h.write_all(data)?;
                h.flush()?;
            }
            StreamTarget::Stderr => {
                let mut h = io::stderr().lock();
                h.write_all(data)?;
                h.flush()?;
            }
            _ => return Err(io::Error::new(io::ErrorKind::Other, "stream is not writable")),
        }
        Ok(data.len())
    }

    /// Reposition the stream.
    pub fn seek(&mut self, pos: i64, whence: Whence) -> io::Result<u64> {
        self.check_open()?;
        let from = match whence {
            Whence::Set => SeekFrom::Start(pos.max(0) as u64),
            Whence::Cur => SeekFrom::Current(pos),
            Whence::End => SeekFrom::End(pos),
        };
        match &mut self.target {
            StreamTarget::File(f) => f.seek(from),
            StreamTarget::Memory(m) => m.seek(from),
            _ => Err(io::Error::new(io::ErrorKind::Other, "stream is not seekable")),
        }
    }

    /// Current position.
    pub fn tell(&mut self) -> io::Result<u64> {
        self.check_open()?;
        match &mut self.target {
            StreamTarget::File(f) => f.stream_position(),
            StreamTarget::Memory(m) => Ok(m.position()),
            _ => Err(io::Error::new(io::ErrorKind::Other, "stream is not seekable")),
        }
    }

    /// Total size in bytes, preserving the current position.
    pub fn size(&mut self) -> io::Result<u64> {
        self.check_open()?;
        match &mut self.target {
            StreamTarget::File(f) => Ok(f.metadata()?.len()),
            StreamTarget::Memory(m) => Ok(m.get_ref().len() as u64),
            _ => Err(io::Error::new(io::ErrorKind::Other, "stream has no size")),
        }
    }

    /// Close the stream. External streams keep their OS handle.
    pub fn close(&mut self) {
        self.open = false;
        if !self.external {
            self.target = StreamTarget::Closed;
        }
    }

    /// Contents of a memory stream.
    pub fn memory_contents(&self) -> Option<&[u8]> {
        match &self.target {
            StreamTarget::Memory(m) => Some(m.get_ref()),
            _ => None,
        }
    }
}

fn read_up_to(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

// ---- ios type methods ----

fn io_err(vm: &Vm, e: io::Error) -> Thrown {
    vm.throw(&core().io_error, e.to_string())
}

fn expect_stream<'v>(
    vm: &Vm,
    args: &'v [Value],
) -> Result<&'v parking_lot::Mutex<Stream>, Thrown> {
    args.first()
        .and_then(|v| v.as_stream())
        .ok_or_else(|| vm.throw(&core().type_error, "expected an 'ios' receiver"))
}

fn ios_new(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let name = args
        .get(1)
        .and_then(|v| v.as_str())
        .ok_or_else(|| vm.throw(&core().arg_error, "ios(fname, mode='r') takes a file name"))?;
    let mode = match args.get(2) {
        None => "r",
        Some(m) => m
            .as_str()
            .ok_or_else(|| vm.throw(&core().arg_error, "ios mode must be a string"))?,
    };
    let stream = Stream::open(name, mode).map_err(|e| {
        vm.throw(
            &core().io_error,
            format!("could not open '{name}' in mode '{mode}': {e}"),
        )
    })?;
    Ok(Value::stream(stream))
}

fn ios_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let s = expect_stream(vm, args)?.lock();
    Ok(Value::str(format!("<ios '{}' mode '{}'>", s.name, s.mode)))
}

fn arg_size(vm: &Vm, args: &[Value], idx: usize) -> Result<Option<usize>, Thrown> {
    match args.get(idx) {
        None => Ok(None),
        Some(v) if v.is_none() => Ok(None),
        Some(v) => v
            .as_i64()
            .filter(|n| *n >= 0)
            .map(|n| Some(n as usize))
            .ok_or_else(|| vm.throw(&core().arg_error, "size must be a non-negative integer")),
    }
}

fn ios_read(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let n = arg_size(vm, args, 1)?;
    let stream = expect_stream(vm, args)?;
    // blocking read happens with the lock released
    let out = vm
        .machine
        .gil
        .blocking(|| stream.lock().read(n))
        .map_err(|e| io_err(vm, e))?;
    Ok(Value::bytes(out))
}

fn ios_read_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let n = arg_size(vm, args, 1)?.unwrap_or(usize::MAX);
    let stream = expect_stream(vm, args)?;
    let out = vm
        .machine
        .gil
        .blocking(|| stream.lock().read_chars(n))
        .map_err(|e| io_err(vm, e))?;
    Ok(Value::str(out))
}

fn ios_write(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let data: Vec<u8> = match args.get(1).map(Value::payload) {
        Some(Payload::Str(s)) => s.text.as_bytes().to_vec(),
        Some(Payload::Bytes(b)) => b.data.to_vec(),
        _ => {
            return Err(vm.throw(
                &core().arg_error,
                "ios.write(data) takes a str or bytes argument",
            ))
        }
    };
    let stream = expect_stream(vm, args)?;
    let n = stream.lock().write(&data).map_err(|e| io_err(vm, e))?;
    Ok(Value::int(n as i64))
}

fn parse_whence(vm: &Vm, v: Option<&Value>) -> Result<Whence, Thrown> {
    match v {
        None => Ok(Whence::Set),
        Some(v) => match (v.as_i64(), v.as_str()) {
            (Some(0), _) | (_, Some("set")) => Ok(Whence::Set),
            (Some(1), _) | (_, Some("cur")) => Ok(Whence::Cur),
            (Some(2), _) | (_, Some("end")) => Ok(Whence::End),
            _ => Err(vm.throw(
                &core().arg_error,
                "whence must be one of 0/'set', 1/'cur', 2/'end'",
            )),
        },
    }
}

fn ios_seek(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let pos = args
        .get(1)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| vm.throw(&core().arg_error, "ios.seek(pos, whence=0) takes an offset"))?;
    let whence = parse_whence(vm, args.get(2))?;
    let stream = expect_stream(vm, args)?;
    let at = stream.lock().seek(pos, whence).map_err(|e| io_err(vm, e))?;
    Ok(Value::int(at as i64))
}

fn ios_tell(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let stream = expect_stream(vm, args)?;
    let at = stream.lock().tell().map_err(|e| io_err(vm, e))?;
    Ok(Value::int(at as i64))
}

fn ios_size(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let stream = expect_stream(vm, args)?;
    let n = stream.lock().size().map_err(|e| io_err(vm, e))?;
    Ok(Value::int(n as i64))
}

fn ios_close(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    expect_stream(vm, args)?.lock().close();
    Ok(Value::none())
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.stream;
    t.define("__new__", "ios.__new__(fname, mode='r')", ios_new);
    t.define("__str__", "ios.__str__(self)", ios_str);
    t.define("__repr__", "ios.__repr__(self)", ios_str);
    t.define("read", "ios.read(self, n_bytes=none)", ios_read);
    t.define("read_str", "ios.read_str(self, n_chars=none)", ios_read_str);
    t.define("write", "ios.write(self, data)", ios_write);
    t.define("seek", "ios.seek(self, pos, whence=0)", ios_seek);
    t.define("tell", "ios.tell(self)", ios_tell);
    t.define("size", "ios.size(self)", ios_size);
    t.define("close", "ios.close(self)", ios_close);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.txt");
        std::fs::write(&path, b"hello stream").unwrap();

        let mut s = Stream::open(path.to_str().unwrap(), "r").unwrap();
        assert_eq!(s.size().unwrap(), 12);
        assert_eq!(s.read(Some(5)).unwrap(), b"hello");
        assert_eq!(s.tell().unwrap(), 5);
        s.seek(6, Whence::Set).unwrap();
        assert_eq!(s.read(None).unwrap(), b"stream");
        s.close();
        assert!(s.read(Some(1)).is_err());
    }

    #[test]
    fn read_chars_decodes_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utf8.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all("héllo".as_bytes()).unwrap();
        drop(f);

        let mut s = Stream::open(path.to_str().unwrap(), "r").unwrap();
        assert_eq!(s.read_chars(3).unwrap(), "hél");
        assert_eq!(s.read_chars(10).unwrap(), "lo");
    }

    #[test]
    fn memory_streams_capture_writes() {
        let mut s = Stream::memory();
        s.write(b"abc").unwrap();
        s.write(b"def").unwrap();
        assert_eq!(s.memory_contents().unwrap(), b"abcdef");
        assert_eq!(s.size().unwrap(), 6);
        s.seek(0, Whence::Set).unwrap();
        assert_eq!(s.read(Some(4)).unwrap(), b"abcd");
    }

    #[test]
    fn external_close_keeps_target() {
        let mut s = Stream::stdout();
        s.close();
        assert!(!s.open);
        assert!(matches!(s.target, StreamTarget::Stdout));
    }
}
