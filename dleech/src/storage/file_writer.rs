use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::metainfo::metainfo::Metainfo;

trait WriteWithOffset {
    fn write_all_at(&mut self, buf: &[u8], offset: u64) -> Result<(), io::Error>;
}

impl WriteWithOffset for File {
    fn write_all_at(&mut self, buf: &[u8], offset: u64) -> Result<(), io::Error> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)
    }
}

/// Owns the open handles of every payload file and scatters verified piece
/// bytes into the right byte ranges.
///
/// All files are created under `download_dir/<name>/` and pre-sized to
/// their full length up front (sparse where the filesystem allows it);
/// existing files are truncated, resuming is not supported.
#[derive(Debug)]
pub struct FileWriter {
    metainfo: Arc<Metainfo>,
    // Parallel to `metainfo.files()`. One lock for all handles: pieces are
    // stored by one session at a time per piece, never per byte range.
    files: Mutex<Vec<File>>,
}

impl FileWriter {
    /// Creates the download layout and opens every file read/write.
    pub fn create(metainfo: Arc<Metainfo>, download_dir: &Path) -> Result<Self, io::Error> {
        let base = download_dir.join(metainfo.name());
        fs::create_dir_all(&base)?;

        let mut handles = Vec::with_capacity(metainfo.files().len());
        for record in metainfo.files() {
            let mut path = base.clone();
            for segment in &record.path {
                path.push(segment);
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)?;
            file.set_len(record.length)?;
            handles.push(file);
        }

        Ok(Self {
            metainfo,
            files: Mutex::new(handles),
        })
    }

    /// Writes the bytes of piece `index` into every file range they
    /// intersect. A piece may span several files; each overlap is written
    /// independently.
    pub fn write_piece(&self, index: u32, bytes: &[u8]) -> Result<(), io::Error> {
        let piece_start = index as u64 * self.metainfo.piece_length();
        let piece_end = piece_start + bytes.len() as u64;

        let mut files = self.lock_files()?;
        for (record, file) in self.metainfo.files().iter().zip(files.iter_mut()) {
            let file_start = record.offset;
            let file_end = record.offset + record.length;

            if piece_start < file_end && piece_end > file_start {
                let overlap_start = piece_start.max(file_start);
                let overlap_end = piece_end.min(file_end);

                let data = &bytes
                    [(overlap_start - piece_start) as usize..(overlap_end - piece_start) as usize];
                file.write_all_at(data, overlap_start - file_start)?;
            }
        }
        Ok(())
    }

    fn lock_files(&self) -> Result<MutexGuard<Vec<File>>, io::Error> {
        self.files
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "file table lock poisoned"))
    }
}
