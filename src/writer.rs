use crate::{Chunk, Device, Driver};
use anyhow::{Context, Result};
use log::info;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Acquisition parameters stored next to the data.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub device: String,
    pub model: String,
    pub serial_number: i32,
    pub sample_rate: i64,
    pub channel_mask: u64,
    pub channel_count: i32,
    pub bytes_per_sample: i32,
}

impl RunInfo {
    pub fn from_device<D: Driver>(device: &Device<D>) -> Self {
        let caps = device.capabilities();
        Self {
            device: device.name().to_string(),
            model: caps.model_name(),
            serial_number: caps.serial_number,
            sample_rate: device.sample_rate().unwrap_or(0),
            channel_mask: device.channel_mask(),
            channel_count: device.channel_count(),
            bytes_per_sample: caps.bytes_per_sample,
        }
    }
}

/// Sink for the chunk stream of one run.
pub trait ChunkWriter: Send {
    fn append(&mut self, chunk: &Chunk) -> Result<()>;

    /// Flushes buffered data. The writer must not be used afterwards.
    fn finish(&mut self) -> Result<()>;

    fn path(&self) -> &Path;
}

/// Concatenates chunk bytes into a flat file, in stream order.
pub struct RawWriter {
    path: PathBuf,
    out: BufWriter<File>,
    bytes: u64,
}

impl RawWriter {
    pub fn create(path: impl Into<PathBuf>, run: &RunInfo) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .with_context(|| format!("creating raw run file {}", path.display()))?;
        info!(
            "Recording {} ({}, {} S/s, channel mask 0x{:x}) to {}",
            run.device,
            run.model,
            run.sample_rate,
            run.channel_mask,
            path.display()
        );
        Ok(Self {
            path,
            out: BufWriter::with_capacity(1 << 20, file),
            bytes: 0,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl ChunkWriter for RawWriter {
    fn append(&mut self, chunk: &Chunk) -> Result<()> {
        self.out
            .write_all(chunk.bytes())
            .with_context(|| format!("writing chunk {} to {}", chunk.seq, self.path.display()))?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        info!("Wrote {} bytes to {}", self.bytes, self.path.display());
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "hdf5")]
pub use self::hdf5_writer::Hdf5Writer;

#[cfg(feature = "hdf5")]
mod hdf5_writer {
    use super::{ChunkWriter, RunInfo};
    use crate::Chunk;
    use anyhow::{Context, Result};
    use hdf5::{types::VarLenUnicode, Dataset, File, Group};
    use log::info;
    use ndarray::aview1;
    use std::path::{Path, PathBuf};

    /// One resizable dataset plus the values not yet written to it.
    struct Column<T> {
        dataset: Dataset,
        pending: Vec<T>,
        written: usize,
    }

    impl<T: hdf5::H5Type + Copy> Column<T> {
        fn new(group: &Group, name: &str, chunk: usize, compression_level: u8) -> Result<Self> {
            let dataset = group
                .new_dataset::<T>()
                .shape(0..)
                .chunk(chunk)
                .blosc_zstd(compression_level, true)
                .create(name)?;
            Ok(Self {
                dataset,
                pending: Vec::with_capacity(chunk),
                written: 0,
            })
        }

        fn flush(&mut self) -> Result<()> {
            if self.pending.is_empty() {
                return Ok(());
            }
            let end = self.written + self.pending.len();
            self.dataset.resize(end)?;
            self.dataset
                .write_slice(aview1(&self.pending), self.written..end)?;
            self.written = end;
            self.pending.clear();
            Ok(())
        }
    }

    /// Stores the byte stream in `/data` and one row per chunk in
    /// `/chunks/{seq,offset,length,received_ns}`, with the run parameters as
    /// file attributes.
    pub struct Hdf5Writer {
        path: PathBuf,
        file: File,
        data: Column<u8>,
        seq: Column<u64>,
        offset: Column<u64>,
        length: Column<u64>,
        received_ns: Column<u64>,
        flush_bytes: usize,
    }

    impl Hdf5Writer {
        pub fn create(
            path: impl Into<PathBuf>,
            run: &RunInfo,
            flush_bytes: usize,
            blosc_threads: u8,
            compression_level: u8,
        ) -> Result<Self> {
            let path = path.into();
            hdf5::filters::blosc_set_nthreads(blosc_threads);
            let file = File::create(&path)
                .with_context(|| format!("creating HDF5 run file {}", path.display()))?;

            let model: VarLenUnicode = run.model.parse()?;
            file.new_attr::<VarLenUnicode>()
                .create("model")?
                .write_scalar(&model)?;
            let device: VarLenUnicode = run.device.parse()?;
            file.new_attr::<VarLenUnicode>()
                .create("device")?
                .write_scalar(&device)?;
            file.new_attr::<i32>()
                .create("serial_number")?
                .write_scalar(&run.serial_number)?;
            file.new_attr::<i64>()
                .create("sample_rate")?
                .write_scalar(&run.sample_rate)?;
            file.new_attr::<u64>()
                .create("channel_mask")?
                .write_scalar(&run.channel_mask)?;
            file.new_attr::<i32>()
                .create("channel_count")?
                .write_scalar(&run.channel_count)?;
            file.new_attr::<i32>()
                .create("bytes_per_sample")?
                .write_scalar(&run.bytes_per_sample)?;

            let flush_bytes = flush_bytes.max(1);
            let data = Column::new(&file, "data", flush_bytes, compression_level)?;
            let chunks = file.create_group("chunks")?;
            let seq = Column::new(&chunks, "seq", 1024, compression_level)?;
            let offset = Column::new(&chunks, "offset", 1024, compression_level)?;
            let length = Column::new(&chunks, "length", 1024, compression_level)?;
            let received_ns = Column::new(&chunks, "received_ns", 1024, compression_level)?;
            info!("Recording {} to {}", run.model, path.display());

            Ok(Self {
                path,
                file,
                data,
                seq,
                offset,
                length,
                received_ns,
                flush_bytes,
            })
        }

        fn flush_all(&mut self) -> Result<()> {
            self.data.flush()?;
            self.seq.flush()?;
            self.offset.flush()?;
            self.length.flush()?;
            self.received_ns.flush()?;
            Ok(())
        }
    }

    impl ChunkWriter for Hdf5Writer {
        fn append(&mut self, chunk: &Chunk) -> Result<()> {
            let received = chunk
                .received
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            self.data.pending.extend_from_slice(chunk.bytes());
            self.seq.pending.push(chunk.seq);
            self.offset.pending.push(chunk.offset as u64);
            self.length.pending.push(chunk.len() as u64);
            self.received_ns.pending.push(received);
            if self.data.pending.len() >= self.flush_bytes {
                self.flush_all()?;
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.flush_all()?;
            self.file.flush()?;
            info!(
                "Wrote {} bytes in {} chunks to {}",
                self.data.written,
                self.seq.written,
                self.path.display()
            );
            Ok(())
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn chunks_and_index_are_stored() {
            let dir = tempfile::tempdir().unwrap();
            let run = RunInfo {
                device: "sim0".into(),
                model: "M4i.4480-x8".into(),
                serial_number: 1,
                sample_rate: 1_000_000,
                channel_mask: 3,
                channel_count: 2,
                bytes_per_sample: 2,
            };
            let path = dir.path().join("run0_0.h5");
            let mut writer = Hdf5Writer::create(&path, &run, 8, 1, 2).unwrap();
            writer.append(&Chunk::copy_from(0, 0, &[1, 2, 3, 4, 5])).unwrap();
            writer.append(&Chunk::copy_from(1, 5, &[6, 7, 8, 9, 10])).unwrap();
            writer.append(&Chunk::copy_from(2, 0, &[11])).unwrap();
            writer.finish().unwrap();
            drop(writer);

            let file = File::open(&path).unwrap();
            let data: Vec<u8> = file.dataset("data").unwrap().read_raw().unwrap();
            assert_eq!(data, (1..=11).collect::<Vec<u8>>());
            let offsets: Vec<u64> = file.dataset("chunks/offset").unwrap().read_raw().unwrap();
            assert_eq!(offsets, vec![0, 5, 0]);
            let rate: i64 = file.attr("sample_rate").unwrap().read_scalar().unwrap();
            assert_eq!(rate, 1_000_000);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_info() -> RunInfo {
        RunInfo {
            device: "sim0".into(),
            model: "M4i.4480-x8".into(),
            serial_number: 12345,
            sample_rate: 10_000_000,
            channel_mask: 1,
            channel_count: 1,
            bytes_per_sample: 2,
        }
    }

    #[test]
    fn raw_file_holds_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run0_0.bin");
        let mut writer = RawWriter::create(&path, &run_info()).unwrap();
        writer.append(&Chunk::copy_from(0, 900, &[1, 2, 3])).unwrap();
        writer.append(&Chunk::copy_from(1, 0, &[4, 5])).unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.bytes_written(), 5);
        assert_eq!(writer.path(), path.as_path());
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn run_info_reflects_device_setup() {
        use crate::{SimCard, SimDriver};
        let mut dev = Device::open(SimDriver::new(SimCard::default()), "sim0").unwrap();
        dev.setup_clock_pll(20_000_000, false).unwrap();
        dev.setup_fifo_single(0b11, 0, 1024, 0).unwrap();
        let info = RunInfo::from_device(&dev);
        assert_eq!(info.model, "M4i.4480-x8");
        assert_eq!(info.sample_rate, 20_000_000);
        assert_eq!(info.channel_count, 2);
    }
}
