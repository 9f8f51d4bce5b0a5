use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

use crate::data::{Sample, TimeFrequency, TimeFrequencyMetadata};

pub trait BlockSource<T>: Send {
    fn next_block(&mut self) -> anyhow::Result<Option<TimeFrequency<T>>>;
}

/// Headerless file of time-major little-endian samples
///
/// The observation layout comes from the caller; each block read carries
/// `spectra_per_block` spectra, the last one fewer.
pub struct RawFileSource<T, R = BufReader<File>> {
    reader: R,
    metadata: TimeFrequencyMetadata,
    spectra_per_block: usize,
    spectra_read: usize,
    bytes: Vec<u8>,
    _sample: PhantomData<T>,
}

impl<T: Sample> RawFileSource<T> {
    pub fn open<P: AsRef<Path>>(
        path: P,
        metadata: TimeFrequencyMetadata,
        spectra_per_block: usize,
    ) -> anyhow::Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file), metadata, spectra_per_block)
    }
}

impl<T: Sample, R: Read + Send> RawFileSource<T, R> {
    pub fn from_reader(
        reader: R,
        metadata: TimeFrequencyMetadata,
        spectra_per_block: usize,
    ) -> anyhow::Result<Self> {
        if metadata.number_of_channels() == 0 {
            anyhow::bail!("Raw input needs at least one channel");
        }
        if spectra_per_block == 0 {
            anyhow::bail!("Block size must be at least one spectrum");
        }
        Ok(Self {
            reader,
            metadata,
            spectra_per_block,
            spectra_read: 0,
            bytes: Vec::new(),
            _sample: PhantomData,
        })
    }

    fn fill(&mut self) -> anyhow::Result<usize> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<T: Sample, R: Read + Send> BlockSource<T> for RawFileSource<T, R> {
    fn next_block(&mut self) -> anyhow::Result<Option<TimeFrequency<T>>> {
        let nchans = self.metadata.number_of_channels();
        let spectrum_bytes = nchans * T::BYTES;
        self.bytes.resize(self.spectra_per_block * spectrum_bytes, 0);

        let filled = self.fill()?;
        let spectra = filled / spectrum_bytes;
        if filled % spectrum_bytes != 0 {
            log::warn!(
                "Ignoring {} trailing bytes of an incomplete spectrum",
                filled % spectrum_bytes
            );
        }
        if spectra == 0 {
            return Ok(None);
        }

        let data = self.bytes[..spectra * spectrum_bytes]
            .chunks_exact(T::BYTES)
            .map(T::from_le_slice)
            .collect();
        let mut metadata = self.metadata.clone();
        metadata.start_time = self.metadata.time_at(self.spectra_read);
        self.spectra_read += spectra;

        Ok(Some(TimeFrequency::from_vec(metadata, data)?))
    }
}

/// Blocks handed over from another thread
pub struct ChannelSource<T> {
    rx: Receiver<TimeFrequency<T>>,
}

impl<T: Sample> ChannelSource<T> {
    pub fn new(rx: Receiver<TimeFrequency<T>>) -> Self {
        Self { rx }
    }
}

impl<T: Sample> BlockSource<T> for ChannelSource<T> {
    fn next_block(&mut self) -> anyhow::Result<Option<TimeFrequency<T>>> {
        match self.rx.recv() {
            Ok(block) => Ok(Some(block)),
            Err(_) => Ok(None),
        }
    }
}

/// Run `source` on a reader thread feeding a channel of `depth` blocks
///
/// The reader stalls while the channel is full. The returned source ends
/// when the reader does; join the handle for its error, if any.
pub fn spawn_reader<T: Sample>(
    mut source: impl BlockSource<T> + 'static,
    depth: usize,
) -> anyhow::Result<(ChannelSource<T>, JoinHandle<anyhow::Result<()>>)> {
    let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
    let handle = thread::Builder::new()
        .name("block-reader".to_string())
        .spawn(move || {
            while let Some(block) = source.next_block()? {
                if tx.send(block).is_err() {
                    log::debug!("Block consumer dropped; reader stopping");
                    break;
                }
            }
            Ok(())
        })?;
    Ok((ChannelSource::new(rx), handle))
}
