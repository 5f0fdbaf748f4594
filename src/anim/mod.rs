use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite};
use serde::Serialize;

use crate::error::Result;
use crate::math::{DsQuaternion, DsVector3};

/// A frame-0 rotation for one bone.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InitialRotation {
    pub bone_id: u32,
    pub rotation: DsQuaternion,
}

/// A frame-0 location or scale for one bone.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InitialVector {
    pub bone_id: u32,
    pub value: DsVector3,
}

/// One bone's keyframes within a block: the sample at the block boundary,
/// a per-frame presence mask over the block's span, and one extra sample
/// per set mask bit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelTrack<T> {
    pub bone_id: u32,
    pub boundary: T,
    pub mask: Vec<bool>,
    pub extras: Vec<T>,
}

impl<T> ChannelTrack<T> {
    /// Expand to (absolute frame, sample) pairs. The boundary sample lands
    /// on `cumulative_frame`; a set bit at offset j lands on
    /// `cumulative_frame + j + 1`.
    pub fn explicit_frames(&self, cumulative_frame: u32) -> Vec<(u32, &T)> {
        let mut out = Vec::with_capacity(1 + self.extras.len());
        out.push((cumulative_frame, &self.boundary));
        let mut extra = self.extras.iter();
        for (j, &set) in self.mask.iter().enumerate() {
            if set {
                if let Some(value) = extra.next() {
                    out.push((cumulative_frame + j as u32 + 1, value));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyframeBlock {
    pub cumulative_frame: u32,
    pub frame_span: u32,
    pub rotations: Vec<ChannelTrack<DsQuaternion>>,
    pub locations: Vec<ChannelTrack<DsVector3>>,
    pub scales: Vec<ChannelTrack<DsVector3>>,
}

fn read_mask<R: std::io::Read + std::io::Seek>(
    reader: &mut R,
    span: usize,
) -> binrw::BinResult<Vec<bool>> {
    let pos = reader.stream_position()?;
    let mut raw = vec![0u8; span];
    reader.read_exact(&mut raw).map_err(binrw::Error::Io)?;
    raw.iter()
        .map(|&b| match b {
            b'0' => Ok(false),
            b'1' => Ok(true),
            other => Err(binrw::Error::AssertFail {
                pos,
                message: format!("keyframe mask byte {:#04x} is not '0' or '1'", other),
            }),
        })
        .collect()
}

fn write_mask<W: std::io::Write + std::io::Seek>(
    writer: &mut W,
    mask: &[bool],
    span: usize,
) -> binrw::BinResult<()> {
    let pos = writer.stream_position()?;
    if mask.len() != span {
        return Err(binrw::Error::AssertFail {
            pos,
            message: format!("keyframe mask length {} does not match span {}", mask.len(), span),
        });
    }
    let raw: Vec<u8> = mask.iter().map(|&b| if b { b'1' } else { b'0' }).collect();
    writer.write_all(&raw).map_err(binrw::Error::Io)
}

impl BinRead for KeyframeBlock {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let cumulative_frame = u32::read_options(reader, endian, ())?;
        let frame_span = u32::read_options(reader, endian, ())?;
        let rot_count = u32::read_options(reader, endian, ())? as usize;
        let loc_count = u32::read_options(reader, endian, ())? as usize;
        let scl_count = u32::read_options(reader, endian, ())? as usize;

        let mut rot_ids = Vec::with_capacity(rot_count);
        for _ in 0..rot_count {
            rot_ids.push(u32::read_options(reader, endian, ())?);
        }
        let mut loc_ids = Vec::with_capacity(loc_count);
        for _ in 0..loc_count {
            loc_ids.push(u32::read_options(reader, endian, ())?);
        }
        let mut scl_ids = Vec::with_capacity(scl_count);
        for _ in 0..scl_count {
            scl_ids.push(u32::read_options(reader, endian, ())?);
        }

        let mut rot_boundaries = Vec::with_capacity(rot_count);
        for _ in 0..rot_count {
            rot_boundaries.push(DsQuaternion::read_options(reader, endian, ())?);
        }
        let mut loc_boundaries = Vec::with_capacity(loc_count);
        for _ in 0..loc_count {
            loc_boundaries.push(DsVector3::read_options(reader, endian, ())?);
        }
        let mut scl_boundaries = Vec::with_capacity(scl_count);
        for _ in 0..scl_count {
            scl_boundaries.push(DsVector3::read_options(reader, endian, ())?);
        }

        let span = frame_span as usize;
        let mut rot_masks = Vec::with_capacity(rot_count);
        for _ in 0..rot_count {
            rot_masks.push(read_mask(reader, span)?);
        }
        let mut loc_masks = Vec::with_capacity(loc_count);
        for _ in 0..loc_count {
            loc_masks.push(read_mask(reader, span)?);
        }
        let mut scl_masks = Vec::with_capacity(scl_count);
        for _ in 0..scl_count {
            scl_masks.push(read_mask(reader, span)?);
        }

        let mut rotations = Vec::with_capacity(rot_count);
        for ((bone_id, boundary), mask) in rot_ids.iter().zip(rot_boundaries).zip(rot_masks) {
            let n = mask.iter().filter(|&&b| b).count();
            let mut extras = Vec::with_capacity(n);
            for _ in 0..n {
                extras.push(DsQuaternion::read_options(reader, endian, ())?);
            }
            rotations.push(ChannelTrack { bone_id: *bone_id, boundary, mask, extras });
        }
        let mut locations = Vec::with_capacity(loc_count);
        for ((bone_id, boundary), mask) in loc_ids.iter().zip(loc_boundaries).zip(loc_masks) {
            let n = mask.iter().filter(|&&b| b).count();
            let mut extras = Vec::with_capacity(n);
            for _ in 0..n {
                extras.push(DsVector3::read_options(reader, endian, ())?);
            }
            locations.push(ChannelTrack { bone_id: *bone_id, boundary, mask, extras });
        }
        let mut scales = Vec::with_capacity(scl_count);
        for ((bone_id, boundary), mask) in scl_ids.iter().zip(scl_boundaries).zip(scl_masks) {
            let n = mask.iter().filter(|&&b| b).count();
            let mut extras = Vec::with_capacity(n);
            for _ in 0..n {
                extras.push(DsVector3::read_options(reader, endian, ())?);
            }
            scales.push(ChannelTrack { bone_id: *bone_id, boundary, mask, extras });
        }

        Ok(KeyframeBlock {
            cumulative_frame,
            frame_span,
            rotations,
            locations,
            scales,
        })
    }
}

impl BinWrite for KeyframeBlock {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        let pos = writer.stream_position()?;
        self.cumulative_frame.write_options(writer, endian, ())?;
        self.frame_span.write_options(writer, endian, ())?;
        (self.rotations.len() as u32).write_options(writer, endian, ())?;
        (self.locations.len() as u32).write_options(writer, endian, ())?;
        (self.scales.len() as u32).write_options(writer, endian, ())?;

        for track in &self.rotations {
            track.bone_id.write_options(writer, endian, ())?;
        }
        for track in &self.locations {
            track.bone_id.write_options(writer, endian, ())?;
        }
        for track in &self.scales {
            track.bone_id.write_options(writer, endian, ())?;
        }

        for track in &self.rotations {
            track.boundary.write_options(writer, endian, ())?;
        }
        for track in &self.locations {
            track.boundary.write_options(writer, endian, ())?;
        }
        for track in &self.scales {
            track.boundary.write_options(writer, endian, ())?;
        }

        let span = self.frame_span as usize;
        for track in &self.rotations {
            write_mask(writer, &track.mask, span)?;
        }
        for track in &self.locations {
            write_mask(writer, &track.mask, span)?;
        }
        for track in &self.scales {
            write_mask(writer, &track.mask, span)?;
        }

        for track in &self.rotations {
            let n = track.mask.iter().filter(|&&b| b).count();
            if track.extras.len() != n {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!(
                        "rotation track for bone {} has {} extras for {} set mask bits",
                        track.bone_id,
                        track.extras.len(),
                        n
                    ),
                });
            }
            for extra in &track.extras {
                extra.write_options(writer, endian, ())?;
            }
        }
        for track in &self.locations {
            let n = track.mask.iter().filter(|&&b| b).count();
            if track.extras.len() != n {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!(
                        "location track for bone {} has {} extras for {} set mask bits",
                        track.bone_id,
                        track.extras.len(),
                        n
                    ),
                });
            }
            for extra in &track.extras {
                extra.write_options(writer, endian, ())?;
            }
        }
        for track in &self.scales {
            let n = track.mask.iter().filter(|&&b| b).count();
            if track.extras.len() != n {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!(
                        "scale track for bone {} has {} extras for {} set mask bits",
                        track.bone_id,
                        track.extras.len(),
                        n
                    ),
                });
            }
            for extra in &track.extras {
                extra.write_options(writer, endian, ())?;
            }
        }
        Ok(())
    }
}

/// The animation file: frame-0 pose arrays followed by keyframe blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimFile {
    pub bone_count: u32,
    pub playback_rate: f32,
    pub initial_rotations: Vec<InitialRotation>,
    pub initial_locations: Vec<InitialVector>,
    pub initial_scales: Vec<InitialVector>,
    pub blocks: Vec<KeyframeBlock>,
}

impl BinRead for AnimFile {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let bone_count = u32::read_options(reader, endian, ())?;
        let playback_rate = f32::read_options(reader, endian, ())?;
        let rot_count = u32::read_options(reader, endian, ())?;
        let loc_count = u32::read_options(reader, endian, ())?;
        let scl_count = u32::read_options(reader, endian, ())?;
        let block_count = u32::read_options(reader, endian, ())?;

        let mut initial_rotations = Vec::with_capacity(rot_count as usize);
        for _ in 0..rot_count {
            initial_rotations.push(InitialRotation::read_options(reader, endian, ())?);
        }
        let mut initial_locations = Vec::with_capacity(loc_count as usize);
        for _ in 0..loc_count {
            initial_locations.push(InitialVector::read_options(reader, endian, ())?);
        }
        let mut initial_scales = Vec::with_capacity(scl_count as usize);
        for _ in 0..scl_count {
            initial_scales.push(InitialVector::read_options(reader, endian, ())?);
        }

        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            blocks.push(KeyframeBlock::read_options(reader, endian, ())?);
        }

        Ok(AnimFile {
            bone_count,
            playback_rate,
            initial_rotations,
            initial_locations,
            initial_scales,
            blocks,
        })
    }
}

impl BinWrite for AnimFile {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        self.bone_count.write_options(writer, endian, ())?;
        self.playback_rate.write_options(writer, endian, ())?;
        (self.initial_rotations.len() as u32).write_options(writer, endian, ())?;
        (self.initial_locations.len() as u32).write_options(writer, endian, ())?;
        (self.initial_scales.len() as u32).write_options(writer, endian, ())?;
        (self.blocks.len() as u32).write_options(writer, endian, ())?;

        for initial in &self.initial_rotations {
            initial.write_options(writer, endian, ())?;
        }
        for initial in &self.initial_locations {
            initial.write_options(writer, endian, ())?;
        }
        for initial in &self.initial_scales {
            initial.write_options(writer, endian, ())?;
        }
        for block in &self.blocks {
            block.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}

impl AnimFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let anim: AnimFile = BinRead::read_options(&mut reader, binrw::Endian::Little, ())?;
        Ok(anim)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = std::io::Cursor::new(data);
        let anim: AnimFile = BinRead::read_options(&mut reader, binrw::Endian::Little, ())?;
        Ok(anim)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        BinWrite::write_options(self, &mut cursor, binrw::Endian::Little, ())?;
        Ok(cursor.into_inner())
    }
}
