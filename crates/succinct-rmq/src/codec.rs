//! Persisted layout of an index
//!
//! ```text
//! "MSS" has_min has_sum has_max
//! [min tables]    if has_min
//! [max tables]    if has_max, built over the decreasing view
//! sequence        prefix sums if has_sum
//! ```
//!
//! Each set of tables starts with six `i32` (`n, s, s', s'', M depth, M′ depth`), followed by the
//! `M` bytes (depth-major), the `M′` positions as `i32`, the micro-block types as `i16` and the
//! `Prec` rows as bytes. Tables of a sequence in naive mode have the header only. Integers and
//! elements are big-endian.
//!
//! Reading never parses the file sequentially: the headers are read once to compute the offset
//! of every section, then each query reads the entries it needs.

use std::{
    fs::File,
    io::{BufWriter, Write},
    marker::PhantomData,
    path::Path,
    sync::OnceLock,
};

use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, Unaligned,
    byteorder::{BigEndian, I16, I32},
};

use crate::{
    Error, Result,
    error::check_range,
    index::{self, IndexOptions, MssIndex, RangeQuery},
    io::{FileReader, ReadAt},
    rmq::{
        self, BLOCK, BLOCK_DEPTH, CATALAN_TOTAL, Geometry, MAX_LEN, MICRO_BLOCK, Rmq, RmqTables,
        SUPER_BLOCK, TableSource,
        block::{self, PrecRow},
    },
    scalar::Scalar,
    sequence::{Decreasing, NumericSequence},
};

pub const MAGIC: [u8; 3] = *b"MSS";

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, Unaligned)]
#[repr(C)]
struct FileHeader {
    magic: [u8; 3],
    has_min: u8,
    has_sum: u8,
    has_max: u8,
}

const FILE_HEADER_LEN: u64 = size_of::<FileHeader>() as u64;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, Unaligned)]
#[repr(C)]
struct TablesHeader {
    len: I32<BigEndian>,
    micro_block: I32<BigEndian>,
    block: I32<BigEndian>,
    super_block: I32<BigEndian>,
    block_depth: I32<BigEndian>,
    super_depth: I32<BigEndian>,
}

const TABLES_HEADER_LEN: u64 = size_of::<TablesHeader>() as u64;

const PREC_LEN: u64 = (CATALAN_TOTAL * MICRO_BLOCK) as u64;

/// `usize` to `i32`, for values bounded by [`MAX_LEN`]
fn to_i32(value: usize) -> Result<I32<BigEndian>> {
    i32::try_from(value)
        .map(I32::new)
        .map_err(|_| Error::TooLarge { len: value })
}

impl TablesHeader {
    fn new(geometry: &Geometry) -> Result<Self> {
        Ok(Self {
            len: to_i32(geometry.len)?,
            micro_block: to_i32(MICRO_BLOCK)?,
            block: to_i32(BLOCK)?,
            super_block: to_i32(SUPER_BLOCK)?,
            block_depth: to_i32(BLOCK_DEPTH)?,
            super_depth: to_i32(geometry.super_depth)?,
        })
    }

    /// Geometry described by the header, if it agrees with the compiled constants.
    fn geometry(&self) -> Result<Geometry> {
        let len = usize::try_from(self.len.get())
            .map_err(|_| Error::malformed(format!("negative sequence length {}", self.len.get())))?;
        let geometry = Geometry::new(len);

        let expected = [
            ("micro-block size", self.micro_block, MICRO_BLOCK),
            ("block size", self.block, BLOCK),
            ("super-block size", self.super_block, SUPER_BLOCK),
            ("block table depth", self.block_depth, BLOCK_DEPTH),
            ("super-block table depth", self.super_depth, geometry.super_depth),
        ];
        for (name, found, expected) in expected {
            if usize::try_from(found.get()).ok() != Some(expected) {
                return Err(Error::malformed(format!(
                    "{name} is {}, expected {expected}",
                    found.get()
                )));
            }
        }
        Ok(geometry)
    }
}

fn write_slice<W: Write, V: IntoBytes + Immutable>(writer: &mut W, values: &[V]) -> Result<()> {
    writer.write_all(values.as_bytes())?;
    Ok(())
}

fn write_tables<W: Write>(writer: &mut W, tables: &RmqTables) -> Result<()> {
    let geometry = tables.geometry();
    writer.write_all(TablesHeader::new(&geometry)?.as_bytes())?;
    if geometry.is_naive() {
        log::trace!("Wrote header of naive tables over {} elements", geometry.len);
        return Ok(());
    }

    for row in tables.block_rows() {
        writer.write_all(row)?;
    }
    for row in tables.super_rows() {
        let row = row
            .iter()
            .map(|&pos| to_i32(pos as usize))
            .collect::<Result<Vec<_>>>()?;
        write_slice(writer, &row)?;
    }
    let types: Vec<I16<BigEndian>> = tables
        .types()
        .iter()
        .map(|&ty| I16::new(ty as i16))
        .collect();
    write_slice(writer, &types)?;
    write_slice(writer, tables.prec_rows())?;

    log::trace!(
        "Wrote tables over {} elements: {} types, {} block rows, {} super-block rows",
        geometry.len,
        types.len(),
        tables.block_rows().len(),
        tables.super_rows().len()
    );
    Ok(())
}

impl<T: Scalar> MssIndex<T> {
    /// Serialize the index to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let options = self.options();
        let header = FileHeader {
            magic: MAGIC,
            has_min: options.min.into(),
            has_sum: options.sum.into(),
            has_max: options.max.into(),
        };
        writer.write_all(header.as_bytes())?;

        if let Some(tables) = self.min_tables() {
            write_tables(&mut writer, tables)?;
        }
        if let Some(tables) = self.max_tables() {
            write_tables(&mut writer, tables)?;
        }

        let sequence = self.prefix_sums().unwrap_or(self.values());
        let encoded: Vec<T::Encoded> = sequence.iter().map(|&value| value.encode()).collect();
        write_slice(&mut writer, &encoded)?;
        log::trace!("Wrote sequence of {} elements", encoded.len());

        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Write the index to a file at `path`, replacing any existing file.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.write_to(BufWriter::new(File::create(path)?))?;
        log::debug!("Persisted index of {} elements to {}", self.values().len(), path.display());
        Ok(())
    }
}

/// Offsets of the sections of one set of tables.
#[derive(Debug, Clone, Copy)]
struct TablesLayout {
    geometry: Geometry,
    block_rows: u64,
    super_rows: u64,
    types: u64,
    prec: u64,
    end: u64,
}

impl TablesLayout {
    fn read<R: ReadAt + ?Sized>(reader: &R, offset: u64, size: u64) -> Result<Self> {
        if offset + TABLES_HEADER_LEN > size {
            return Err(Error::malformed("truncated table header"));
        }
        let header: TablesHeader = read_value(reader, offset)?;
        let geometry = header.geometry()?;

        let block_rows = offset + TABLES_HEADER_LEN;
        let layout = if geometry.is_naive() {
            Self {
                geometry,
                block_rows,
                super_rows: block_rows,
                types: block_rows,
                prec: block_rows,
                end: block_rows,
            }
        } else {
            let super_rows = block_rows + (BLOCK_DEPTH * geometry.n_blocks) as u64;
            let types = super_rows + (4 * geometry.super_depth * geometry.n_super) as u64;
            let prec = types + 2 * geometry.n_micro as u64;
            Self {
                geometry,
                block_rows,
                super_rows,
                types,
                prec,
                end: prec + PREC_LEN,
            }
        };

        if layout.end > size {
            return Err(Error::malformed(format!(
                "tables over {} elements end at byte {}, past the end of the file at {size}",
                geometry.len, layout.end
            )));
        }
        Ok(layout)
    }
}

/// Offsets of every section of a persisted index, computed once per reader.
#[derive(Debug, Clone, Copy)]
struct Layout {
    options: IndexOptions,
    min: Option<TablesLayout>,
    max: Option<TablesLayout>,
    sequence: u64,
    len: usize,
}

fn parse_flag(byte: u8, name: &str) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::malformed(format!("flag {name} is {byte}, expected 0 or 1"))),
    }
}

impl Layout {
    fn read<R: ReadAt + ?Sized, T: Scalar>(reader: &R) -> Result<Self> {
        let size = reader.size()?;
        if size < FILE_HEADER_LEN {
            return Err(Error::malformed(format!(
                "file of {size} bytes is shorter than its header"
            )));
        }
        let header: FileHeader = read_value(reader, 0)?;
        if header.magic != MAGIC {
            return Err(Error::BadMagic {
                found: header.magic,
            });
        }
        let options = IndexOptions {
            min: parse_flag(header.has_min, "has_min")?,
            sum: parse_flag(header.has_sum, "has_sum")?,
            max: parse_flag(header.has_max, "has_max")?,
        };

        let mut offset = FILE_HEADER_LEN;
        let min = if options.min {
            let tables = TablesLayout::read(reader, offset, size)?;
            offset = tables.end;
            Some(tables)
        } else {
            None
        };
        let max = if options.max {
            let tables = TablesLayout::read(reader, offset, size)?;
            offset = tables.end;
            Some(tables)
        } else {
            None
        };

        let sequence = offset;
        let remaining = size - sequence;
        let width = T::WIDTH as u64;
        let len = match (min.or(max), max) {
            (Some(first), Some(max)) if first.geometry.len != max.geometry.len => {
                return Err(Error::malformed(format!(
                    "min tables over {} elements, max tables over {}",
                    first.geometry.len, max.geometry.len
                )));
            }
            (Some(first), _) => first.geometry.len,
            (None, _) => {
                if remaining % width != 0 {
                    return Err(Error::malformed(format!(
                        "sequence of {remaining} bytes is not a multiple of {width}"
                    )));
                }
                let len = (remaining / width) as usize;
                if len > MAX_LEN {
                    return Err(Error::TooLarge { len });
                }
                len
            }
        };
        if remaining != len as u64 * width {
            return Err(Error::malformed(format!(
                "sequence of {len} elements takes {} bytes, found {remaining}",
                len as u64 * width
            )));
        }

        log::debug!(
            "Loaded index layout: {options:?}, {len} elements, min tables at {:?}, max tables at {:?}, sequence at {sequence}",
            min.map(|tables| tables.block_rows),
            max.map(|tables| tables.block_rows),
        );

        Ok(Self {
            options,
            min,
            max,
            sequence,
            len,
        })
    }
}

fn read_value<V: FromBytes + IntoBytes, R: ReadAt + ?Sized>(reader: &R, pos: u64) -> Result<V> {
    let mut value = V::new_zeroed();
    reader.read_exact_at(pos, value.as_mut_bytes())?;
    Ok(value)
}

fn read_vec<V, R>(reader: &R, pos: u64, len: usize) -> Result<Vec<V>>
where
    V: FromBytes + IntoBytes + Copy,
    R: ReadAt + ?Sized,
{
    let mut values = vec![V::new_zeroed(); len];
    reader.read_exact_at(pos, values.as_mut_bytes())?;
    Ok(values)
}

fn check_type(ty: i16) -> Result<usize> {
    usize::try_from(ty)
        .ok()
        .filter(|&ty| ty < CATALAN_TOTAL)
        .ok_or_else(|| Error::malformed(format!("micro-block type {ty} out of range")))
}

fn check_position(pos: i32, len: usize) -> Result<usize> {
    usize::try_from(pos)
        .ok()
        .filter(|&pos| pos < len)
        .ok_or_else(|| Error::malformed(format!("position {pos} out of range")))
}

/// Tables read entry by entry from storage.
struct FileTables<'a, R: ?Sized> {
    reader: &'a R,
    layout: &'a TablesLayout,
}

impl<R: ReadAt + ?Sized> TableSource for FileTables<'_, R> {
    fn geometry(&self) -> Geometry {
        self.layout.geometry
    }

    fn block_type(&self, micro: usize) -> Result<usize> {
        let ty: I16<BigEndian> = read_value(self.reader, self.layout.types + 2 * micro as u64)?;
        check_type(ty.get())
    }

    fn prec(&self, ty: usize) -> Result<PrecRow> {
        block::check_row(read_value(self.reader, self.layout.prec + (ty * MICRO_BLOCK) as u64)?)
    }

    fn block_min(&self, depth: usize, block: usize) -> Result<usize> {
        let pos = self.layout.block_rows + (depth * self.layout.geometry.n_blocks + block) as u64;
        let offset: u8 = read_value(self.reader, pos)?;
        self.layout.geometry.check_block_offset(depth, block, offset)
    }

    fn super_block_min(&self, depth: usize, super_block: usize) -> Result<usize> {
        let index = depth * self.layout.geometry.n_super + super_block;
        let pos: I32<BigEndian> = read_value(self.reader, self.layout.super_rows + 4 * index as u64)?;
        check_position(pos.get(), self.layout.geometry.len)
    }
}

impl<R: ReadAt + ?Sized> FileTables<'_, R> {
    fn load(&self) -> Result<RmqTables> {
        let geometry = self.layout.geometry;
        if geometry.is_naive() {
            return RmqTables::from_parts(geometry, Vec::new(), Vec::new(), Vec::new(), Vec::new());
        }

        let block_rows: Vec<u8> = read_vec(
            self.reader,
            self.layout.block_rows,
            BLOCK_DEPTH * geometry.n_blocks,
        )?;
        let super_rows: Vec<I32<BigEndian>> = read_vec(
            self.reader,
            self.layout.super_rows,
            geometry.super_depth * geometry.n_super,
        )?;
        let super_rows = super_rows
            .iter()
            .map(|pos| check_position(pos.get(), geometry.len).map(|pos| pos as u32))
            .collect::<Result<Vec<_>>>()?;
        let types: Vec<I16<BigEndian>> = read_vec(self.reader, self.layout.types, geometry.n_micro)?;
        let types = types
            .iter()
            .map(|ty| check_type(ty.get()).map(|ty| ty as u16))
            .collect::<Result<Vec<_>>>()?;
        let prec: Vec<PrecRow> = read_vec(self.reader, self.layout.prec, CATALAN_TOTAL)?;

        RmqTables::from_parts(
            geometry,
            types,
            prec,
            block_rows.chunks(geometry.n_blocks).map(<[u8]>::to_vec).collect(),
            super_rows.chunks(geometry.n_super).map(<[u32]>::to_vec).collect(),
        )
    }
}

/// A persisted sequence read element by element.
///
/// If the stored elements are prefix sums, elements are recovered by differencing two consecutive
/// sums.
#[derive(Debug)]
pub struct PagedSequence<'a, R: ?Sized, T> {
    reader: &'a R,
    offset: u64,
    len: usize,
    prefix_summed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, R: ReadAt + ?Sized, T: Scalar> PagedSequence<'a, R, T> {
    fn new(reader: &'a R, layout: &Layout, prefix_summed: bool) -> Self {
        Self {
            reader,
            offset: layout.sequence,
            len: layout.len,
            prefix_summed,
            _marker: PhantomData,
        }
    }

    fn stored(&self, pos: usize) -> Result<T> {
        let encoded: T::Encoded = read_value(self.reader, self.offset + (pos * T::WIDTH) as u64)?;
        Ok(T::decode(encoded))
    }
}

impl<R: ReadAt + ?Sized, T: Scalar> NumericSequence for PagedSequence<'_, R, T> {
    type Value = T;

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, pos: usize) -> Result<T> {
        let stored = self.stored(pos)?;
        if self.prefix_summed && pos > 0 {
            Ok(stored.sub(self.stored(pos - 1)?))
        } else {
            Ok(stored)
        }
    }
}

/// A persisted index, queried in place.
///
/// The layout of the index is read on the first query, or immediately with
/// [`IndexReader::open`]. After that each query reads a handful of entries from `R`. Queries only
/// take `&self`, so a reader can be shared across threads whenever `R` supports concurrent reads.
///
/// The element type `T` is not persisted and must be the one the index was built with.
///
/// If the index has sum support, elements are recovered from prefix sums. For floats this may
/// round, so [`value_at`](RangeQuery::value_at) and the values of [`range_min`](RangeQuery::range_min)
/// and [`range_max`](RangeQuery::range_max) can differ slightly from the in-memory index.
#[derive(Debug)]
pub struct IndexReader<R, T> {
    reader: R,
    layout: OnceLock<Layout>,
    _marker: PhantomData<fn() -> T>,
}

impl<R: ReadAt, T: Scalar> IndexReader<R, T> {
    /// Wrap `reader` without reading anything yet.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            layout: OnceLock::new(),
            _marker: PhantomData,
        }
    }

    /// Wrap `reader` and load the layout immediately, failing early on a malformed index.
    pub fn open(reader: R) -> Result<Self> {
        let index = Self::new(reader);
        index.layout()?;
        Ok(index)
    }

    fn layout(&self) -> Result<&Layout> {
        if let Some(layout) = self.layout.get() {
            return Ok(layout);
        }
        let layout = Layout::read::<R, T>(&self.reader)?;
        Ok(self.layout.get_or_init(|| layout))
    }

    /// Whether the layout has been loaded
    pub fn is_loaded(&self) -> bool {
        self.layout.get().is_some()
    }

    pub fn options(&self) -> Result<IndexOptions> {
        Ok(self.layout()?.options)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// The persisted sequence, read element by element
    pub fn sequence(&self) -> Result<PagedSequence<'_, R, T>> {
        let layout = self.layout()?;
        Ok(PagedSequence::new(&self.reader, layout, layout.options.sum))
    }

    fn check_range(&self, start: usize, end: usize) -> Result<&Layout> {
        let layout = self.layout()?;
        check_range(start, end, layout.len)?;
        Ok(layout)
    }

    /// Read every table and the sequence into an in-memory index answering the same queries.
    pub fn promote_to_memory(&self) -> Result<MssIndex<T>> {
        let layout = self.layout()?;
        let stored: Vec<T::Encoded> = read_vec(&self.reader, layout.sequence, layout.len)?;
        let stored: Vec<T> = stored.into_iter().map(T::decode).collect();
        let (values, prefix_sums) = if layout.options.sum {
            let values = (0..stored.len())
                .map(|pos| match pos {
                    0 => stored[0],
                    _ => stored[pos].sub(stored[pos - 1]),
                })
                .collect();
            (values, Some(stored))
        } else {
            (stored, None)
        };

        let load = |tables: &Option<TablesLayout>| {
            tables
                .as_ref()
                .map(|layout| {
                    FileTables {
                        reader: &self.reader,
                        layout,
                    }
                    .load()
                })
                .transpose()
        };
        let min = load(&layout.min)?;
        let max = load(&layout.max)?;

        log::debug!(
            "Promoted index of {} elements to memory with {:?}",
            layout.len,
            layout.options
        );
        Ok(MssIndex::from_parts(values, prefix_sums, min, max))
    }
}

impl<T: Scalar> IndexReader<FileReader, T> {
    /// Open the index persisted at `path`, loading its layout immediately.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(FileReader::open(path)?)
    }
}

fn argmin_in<R, S>(
    reader: &R,
    tables: Option<&TablesLayout>,
    seq: &S,
    start: usize,
    end: usize,
) -> Result<usize>
where
    R: ReadAt + ?Sized,
    S: NumericSequence + ?Sized,
{
    match tables {
        Some(layout) => Rmq::new(&FileTables { reader, layout }, seq).min_in(start, end),
        None => rmq::scan(seq, start, end),
    }
}

impl<R: ReadAt, T: Scalar> RangeQuery for IndexReader<R, T> {
    type Value = T;

    fn len(&self) -> Result<usize> {
        Ok(self.layout()?.len)
    }

    fn value_at(&self, pos: usize) -> Result<T> {
        self.check_range(pos, pos)?;
        self.sequence()?.get(pos)
    }

    fn range_argmin(&self, start: usize, end: usize) -> Result<usize> {
        let layout = self.check_range(start, end)?;
        argmin_in(&self.reader, layout.min.as_ref(), &self.sequence()?, start, end)
    }

    fn range_argmax(&self, start: usize, end: usize) -> Result<usize> {
        let layout = self.check_range(start, end)?;
        let seq = Decreasing(self.sequence()?);
        argmin_in(&self.reader, layout.max.as_ref(), &seq, start, end)
    }

    fn range_sum(&self, start: usize, end: usize) -> Result<T> {
        let layout = self.check_range(start, end)?;
        if layout.options.sum {
            let prefix_sums = PagedSequence::<R, T>::new(&self.reader, layout, false);
            index::prefix_sum_range(&prefix_sums, start, end)
        } else {
            index::direct_sum(&self.sequence()?, start, end)
        }
    }
}
