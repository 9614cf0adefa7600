//! Ephemeral file descriptors with fixed content.
//!
//! [`mock_file_descriptor`] hands back the read end of a fresh pipe and
//! writes the content from a background job, so arbitrarily large content
//! never blocks the call that asked for it. The reader sees the content
//! followed by end-of-file once the writer closes its end.

use std::{
    fs::File,
    io::{self, Read, Write},
    os::fd::OwnedFd,
};

use nix::sys::signal::{SigSet, SigmaskHow, Signal};

use crate::{lifecycle::fatal, tasks::BackgroundTasks};

/// Descriptor that reads back exactly `content`.
///
/// A reader that closes early is tolerated: the writer stops at the broken
/// pipe. Any other write failure aborts the process.
pub fn mock_file_descriptor(tasks: &BackgroundTasks, content: Vec<u8>) -> io::Result<OwnedFd> {
    let (reader, writer) = io::pipe()?;
    tasks.spawn_blocking(move || write_content(writer, &content));
    Ok(reader.into())
}

/// Read `fd` to end-of-file.
pub fn read_to_end(fd: OwnedFd) -> io::Result<Vec<u8>> {
    let mut file = File::from(fd);
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Write `content` and close, with SIGPIPE blocked for the duration.
fn write_content(mut writer: impl Write, content: &[u8]) {
    let len = content.len();
    let previous = block_sigpipe();

    let broken = match writer.write_all(content) {
        Ok(()) => {
            tracing::debug!(len, "mock descriptor written");
            false
        },
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!(len, "mock descriptor reader closed early");
            true
        },
        Err(e) => fatal(&format!("mock descriptor write failed: {e}")),
    };

    drop(writer);
    restore_mask(&previous, broken);
}

fn sigpipe() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGPIPE);
    set
}

/// Block SIGPIPE on the calling thread so a closed reader yields `EPIPE`.
/// Returns the mask to put back afterwards.
fn block_sigpipe() -> SigSet {
    sigpipe()
        .thread_swap_mask(SigmaskHow::SIG_BLOCK)
        .unwrap_or_else(|e| fatal(&format!("failed to block SIGPIPE: {e}")))
}

/// Put back `previous`. A broken write leaves SIGPIPE pending on this
/// thread; it is consumed first unless `previous` kept it blocked anyway.
fn restore_mask(previous: &SigSet, broken: bool) {
    if broken
        && !previous.contains(Signal::SIGPIPE)
        && let Err(e) = sigpipe().wait()
    {
        fatal(&format!("failed to consume SIGPIPE: {e}"));
    }
    if let Err(e) = previous.thread_set_mask() {
        fatal(&format!("failed to restore signal mask: {e}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_back_content() {
        let tasks = BackgroundTasks::new();
        let fd = mock_file_descriptor(&tasks, b"hello".to_vec()).unwrap();

        let content = tokio::task::spawn_blocking(move || read_to_end(fd)).await.unwrap().unwrap();
        assert_eq!(content, b"hello");

        tasks.drain().await;
    }

    #[tokio::test]
    async fn content_larger_than_pipe_buffer() {
        let tasks = BackgroundTasks::new();
        let big: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        let fd = mock_file_descriptor(&tasks, big.clone()).unwrap();

        let content = tokio::task::spawn_blocking(move || read_to_end(fd)).await.unwrap().unwrap();
        assert_eq!(content, big);

        tasks.drain().await;
    }

    #[tokio::test]
    async fn early_close_is_tolerated() {
        let tasks = BackgroundTasks::new();
        let fd = mock_file_descriptor(&tasks, vec![7u8; 1 << 20]).unwrap();
        drop(fd);

        // The writer hits a broken pipe and finishes instead of aborting.
        tasks.drain().await;
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn empty_content_reads_as_eof() {
        let tasks = BackgroundTasks::new();
        let fd = mock_file_descriptor(&tasks, Vec::new()).unwrap();

        let content = tokio::task::spawn_blocking(move || read_to_end(fd)).await.unwrap().unwrap();
        assert!(content.is_empty());

        tasks.drain().await;
    }

    #[test]
    fn writer_thread_mask_is_restored() {
        std::thread::spawn(|| {
            let before = SigSet::thread_get_mask().unwrap();
            assert!(!before.contains(Signal::SIGPIPE));

            let (reader, writer) = io::pipe().unwrap();
            write_content(writer, b"done");
            assert!(!SigSet::thread_get_mask().unwrap().contains(Signal::SIGPIPE));
            assert_eq!(read_to_end(reader.into()).unwrap(), b"done");

            let (reader, writer) = io::pipe().unwrap();
            drop(reader);
            write_content(writer, &[1u8; 1 << 17]);
            assert!(!SigSet::thread_get_mask().unwrap().contains(Signal::SIGPIPE));
        })
        .join()
        .unwrap();
    }
}
