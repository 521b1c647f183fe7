use super::ImageSet;
use crate::result::Result;
use anyhow::Context;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{ArcArray, ArcArray1};
use std::{
    fs::{self, File},
    io::{BufReader, Read, Write},
    path::Path,
};
use tracing::{debug, info};

const TRAIN_LEN: usize = 60_000;
const TEST_LEN: usize = 10_000;
const IMAGE_MAGIC: i32 = 2_051;
const LABEL_MAGIC: i32 = 2_049;
const ROWS: usize = 28;
const COLUMNS: usize = 28;

/// The kind of Mnist.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MnistKind {
    /// [MNIST](<http://yann.lecun.com/exdb/mnist/>)
    #[default]
    Digits,
    /// [FashionMNIST](<https://github.com/zalandoresearch/fashion-mnist>)
    Fashion,
}

impl MnistKind {
    fn name(self) -> &'static str {
        match self {
            Self::Digits => "mnist",
            Self::Fashion => "fashion-mnist",
        }
    }
    fn url(self, file_name: &str) -> String {
        match self {
            Self::Digits => format!("https://ossci-datasets.s3.amazonaws.com/mnist/{file_name}"),
            Self::Fashion => format!(
                "http://fashion-mnist.s3-website.eu-central-1.amazonaws.com/{file_name}"
            ),
        }
    }
}

/// Errors reading [IDX](<http://yann.lecun.com/exdb/mnist/>) files.
#[derive(Debug, thiserror::Error)]
pub enum IdxError {
    /// The file does not start with the expected magic number.
    #[error("expected magic number {expected}, found {found}")]
    Magic {
        /// Expected.
        expected: i32,
        /// Found.
        found: i32,
    },
    /// The header or the payload has the wrong number of items.
    #[error("expected {expected} items, found {found}")]
    Count {
        /// Expected.
        expected: usize,
        /// Found.
        found: usize,
    },
    /// The images are not 28 x 28.
    #[error("expected {expected:?} images, found {found:?}")]
    Dim {
        /// Expected (rows, columns).
        expected: (usize, usize),
        /// Found (rows, columns).
        found: (usize, usize),
    },
}

/// Mnist builder.
pub mod builders {
    use super::{Mnist, MnistKind, Result};
    use std::path::Path;

    /// Mnist builder.
    #[derive(Debug)]
    pub struct MnistBuilder<'a> {
        pub(super) path: Option<&'a Path>,
        pub(super) kind: MnistKind,
        pub(super) download: bool,
    }

    impl Default for MnistBuilder<'_> {
        fn default() -> Self {
            Self {
                path: None,
                kind: MnistKind::Digits,
                download: false,
            }
        }
    }

    impl MnistBuilder<'_> {
        /// The path to load the dataset from.
        ///
        /// The files are downloaded to / loaded from a "mnist" or "fashion-mnist" folder within
        /// `path`. If not specified, uses the OS specific "Downloads" directory or the "Temp"
        /// directory.
        pub fn path<'b>(self, path: &'b Path) -> MnistBuilder<'b> {
            MnistBuilder {
                path: Some(path),
                kind: self.kind,
                download: self.download,
            }
        }
        /// The kind of Mnist to use. Defaults to [`MnistKind::Digits`] (ie the original MNIST dataset).
        pub fn kind(self, kind: MnistKind) -> Self {
            Self { kind, ..self }
        }
        /// Whether to download missing files. Defaults to false.
        pub fn download(self, download: bool) -> Self {
            Self { download, ..self }
        }
        /// Builds the dataset.
        ///
        /// **Errors**
        /// - The download failed.
        /// - The files were not found.
        /// - Decompressing / loading the data failed.
        pub fn build(&self) -> Result<Mnist> {
            Mnist::build(self)
        }
    }
}
use builders::MnistBuilder;

/// The MNIST dataset.
#[derive(Clone, Debug)]
pub struct Mnist {
    kind: MnistKind,
    train: ImageSet,
    test: ImageSet,
}

impl Mnist {
    /// Returns an [`MnistBuilder`] used to specify options.
    /**
    ```no_run
    # use mnist_vae::{result::Result, dataset::mnist::{Mnist, MnistKind}};
    # use std::path::Path;
    # fn main() -> Result<()> {
    let mnist = Mnist::builder()
        .path(Path::new("data"))
        .kind(MnistKind::Fashion)
        .download(true)
        .build()?;
    # Ok(())
    # }
    ```
    */
    pub fn builder() -> MnistBuilder<'static> {
        MnistBuilder::default()
    }
    fn build(builder: &MnistBuilder) -> Result<Self> {
        let mnist_path = builder
            .path
            .map(Path::to_owned)
            .unwrap_or_else(|| dirs::download_dir().unwrap_or_else(std::env::temp_dir))
            .join(builder.kind.name());
        let names = [
            "train-images-idx3-ubyte",
            "train-labels-idx1-ubyte",
            "t10k-images-idx3-ubyte",
            "t10k-labels-idx1-ubyte",
        ];
        if builder.download {
            fs::create_dir_all(&mnist_path)
                .with_context(|| format!("creating {mnist_path:?}"))?;
            for name in names {
                let file_name = format!("{name}.gz");
                let path = mnist_path.join(&file_name);
                if path.exists() {
                    debug!("found {path:?}");
                    continue;
                }
                let url = builder.kind.url(&file_name);
                info!("downloading {url}");
                download(&url, &path).with_context(|| format!("downloading {url}"))?;
            }
        }
        let open = |name: &str| -> Result<GzDecoder<BufReader<File>>> {
            let path = mnist_path.join(name).with_extension("gz");
            let file = File::open(&path).with_context(|| format!("opening {path:?}"))?;
            Ok(GzDecoder::new(BufReader::new(file)))
        };
        let train_images = decode_images(open(names[0])?, TRAIN_LEN)?;
        let train_classes = decode_labels(open(names[1])?, TRAIN_LEN)?;
        let test_images = decode_images(open(names[2])?, TEST_LEN)?;
        let test_classes = decode_labels(open(names[3])?, TEST_LEN)?;
        let train = ImageSet::new(
            ArcArray::from_shape_vec([TRAIN_LEN, 1, ROWS, COLUMNS], train_images)?,
            ArcArray1::from(train_classes),
        )?;
        let test = ImageSet::new(
            ArcArray::from_shape_vec([TEST_LEN, 1, ROWS, COLUMNS], test_images)?,
            ArcArray1::from(test_classes),
        )?;
        Ok(Self {
            kind: builder.kind,
            train,
            test,
        })
    }
    /// The kind of Mnist.
    pub fn kind(&self) -> MnistKind {
        self.kind
    }
    /// The training set.
    ///
    /// Shape = \[60_000, 1, 28, 28\].
    pub fn train(&self) -> &ImageSet {
        &self.train
    }
    /// The test set.
    ///
    /// Shape = \[10_000, 1, 28, 28\].
    pub fn test(&self) -> &ImageSet {
        &self.test
    }
}

fn read_header<R: Read>(reader: &mut R, magic: i32, n: usize) -> Result<()> {
    let found = reader.read_i32::<BigEndian>()?;
    if found != magic {
        return Err(IdxError::Magic {
            expected: magic,
            found,
        }
        .into());
    }
    let found = reader.read_u32::<BigEndian>()? as usize;
    if found != n {
        return Err(IdxError::Count { expected: n, found }.into());
    }
    Ok(())
}

fn read_payload<R: Read>(mut reader: R, len: usize) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(len);
    reader.read_to_end(&mut data)?;
    if data.len() != len {
        return Err(IdxError::Count {
            expected: len,
            found: data.len(),
        }
        .into());
    }
    Ok(data)
}

fn decode_images<R: Read>(mut reader: R, n: usize) -> Result<Vec<u8>> {
    read_header(&mut reader, IMAGE_MAGIC, n)?;
    let rows = reader.read_u32::<BigEndian>()? as usize;
    let columns = reader.read_u32::<BigEndian>()? as usize;
    if (rows, columns) != (ROWS, COLUMNS) {
        return Err(IdxError::Dim {
            expected: (ROWS, COLUMNS),
            found: (rows, columns),
        }
        .into());
    }
    read_payload(reader, n * ROWS * COLUMNS)
}

fn decode_labels<R: Read>(mut reader: R, n: usize) -> Result<Vec<u8>> {
    read_header(&mut reader, LABEL_MAGIC, n)?;
    read_payload(reader, n)
}

fn download(url: &str, path: &Path) -> Result<()> {
    use curl::easy::Easy;

    let part = path.with_extension("part");
    let mut file = File::create(&part).with_context(|| format!("creating {part:?}"))?;
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40}] {bytes:>10}/{total_bytes:10} [eta: {eta}]")?
        .progress_chars("=> ");
    let name = path
        .file_name()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bar = ProgressBar::new(0).with_style(style).with_message(name);
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.fail_on_error(true)?;
    easy.progress(true)?;
    let mut write_error = None;
    let result = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match file.write_all(data) {
            Ok(()) => Ok(data.len()),
            Err(error) => {
                write_error.replace(error);
                Ok(0)
            }
        })?;
        transfer.progress_function(|total, done, _, _| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
            true
        })?;
        transfer.perform()
    };
    bar.finish_and_clear();
    if let Some(error) = write_error {
        return Err(error.into());
    }
    result?;
    file.flush()?;
    drop(file);
    fs::rename(&part, path)?;
    Ok(())
}
