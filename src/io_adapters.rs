use crate::clause::WriteMode;
use crate::env::Environment;
use crate::execution::{InputSource, OutputSink};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Cursor, Read, Result as IoResult, Write};

/// Input handed to one command. Files are closed when the value is dropped.
pub enum CommandInput<'a> {
    Terminal(&'a mut dyn Read),
    File(BufReader<File>),
    /// Output of the previous command in a pipe.
    Pipe(Cursor<Vec<u8>>),
}

impl Read for CommandInput<'_> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match self {
            CommandInput::Terminal(r) => r.read(buf),
            CommandInput::File(r) => r.read(buf),
            CommandInput::Pipe(r) => r.read(buf),
        }
    }
}

/// Output of one command.
pub enum CommandOutput<'a> {
    Terminal(&'a mut dyn Write),
    File(BufWriter<File>),
    /// Captured for the next command in a pipe.
    Pipe(Vec<u8>),
}

impl CommandOutput<'_> {
    /// Flush and release the sink, returning captured bytes for a pipe.
    pub fn finish(self) -> IoResult<Option<Vec<u8>>> {
        match self {
            CommandOutput::Terminal(w) => {
                w.flush()?;
                Ok(None)
            }
            CommandOutput::File(mut w) => {
                w.flush()?;
                Ok(None)
            }
            CommandOutput::Pipe(buf) => Ok(Some(buf)),
        }
    }
}

impl Write for CommandOutput<'_> {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        match self {
            CommandOutput::Terminal(w) => w.write(data),
            CommandOutput::File(w) => w.write(data),
            CommandOutput::Pipe(buf) => {
                buf.extend_from_slice(data);
                Ok(data.len())
            }
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            CommandOutput::Terminal(w) => w.flush(),
            CommandOutput::File(w) => w.flush(),
            CommandOutput::Pipe(_) => Ok(()),
        }
    }
}

/// Open `source`. A pipe with nothing buffered reads as empty.
pub fn open_input<'a>(
    source: &InputSource,
    env: &Environment,
    terminal: &'a mut dyn Read,
    piped: Option<Vec<u8>>,
) -> IoResult<CommandInput<'a>> {
    Ok(match source {
        InputSource::Terminal => CommandInput::Terminal(terminal),
        InputSource::File(path) => {
            CommandInput::File(BufReader::new(File::open(env.resolve_path(path))?))
        }
        InputSource::PipeFromPrevious => CommandInput::Pipe(Cursor::new(piped.unwrap_or_default())),
    })
}

pub fn open_output<'a>(
    sink: &OutputSink,
    env: &Environment,
    terminal: &'a mut dyn Write,
) -> IoResult<CommandOutput<'a>> {
    Ok(match sink {
        OutputSink::Terminal => CommandOutput::Terminal(terminal),
        OutputSink::File { path, mode } => {
            let mut options = OpenOptions::new();
            options.create(true);
            match mode {
                WriteMode::Truncate => options.write(true).truncate(true),
                WriteMode::Append => options.append(true),
            };
            CommandOutput::File(BufWriter::new(options.open(env.resolve_path(path))?))
        }
        OutputSink::PipeToNext => CommandOutput::Pipe(Vec::new()),
    })
}
