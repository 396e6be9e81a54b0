//! # Snapshot File Format
//!
//! Snapshots are persisted as a flat MessagePack stream. Only used
//! component types are written.
//!
//! ```text
//! array_header  numUsedComponentTypes
//! repeat:
//!   u32     internalID
//!   u32     version
//!   str     name
//! array_header  numEntities
//! repeat:
//!   u32     localEntityID
//!   array_header  numComponents
//!   repeat:
//!     u32   internalComponentTypeID
//!     bin   payload
//! ```
//!
//! Path saves go through a sibling `.tmp` file that is renamed into place
//! once fully written and synced. A failed save removes the temporary file
//! and leaves any previous save untouched.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::cursor::{decode_error, encode_error};
use super::snapshot::{SerializedComponent, SerializedComponentInfo, SerializedEcps, SerializedEntityInfo};
use crate::ecs::EntityId;
use crate::error::{EcpsError, EcpsResult};

/// Upper bound on speculative preallocation from untrusted lengths.
const MAX_PREALLOC: usize = 1024;

fn len_u32(len: usize) -> EcpsResult<u32> {
    u32::try_from(len).map_err(|_| EcpsError::Encode(format!("length {len} does not fit in u32")))
}

/// Writes a snapshot to any byte sink.
///
/// # Errors
///
/// Returns [`EcpsError::Encode`] if the sink fails.
pub fn write_snapshot<W: Write>(writer: &mut W, snapshot: &SerializedEcps) -> EcpsResult<()> {
    let used: Vec<&SerializedComponentInfo> = snapshot.components.iter().filter(|info| info.used).collect();
    rmp::encode::write_array_len(writer, len_u32(used.len())?).map_err(encode_error)?;
    for info in used {
        rmp::encode::write_u32(writer, info.internal_id).map_err(encode_error)?;
        rmp::encode::write_u32(writer, info.version).map_err(encode_error)?;
        rmp::encode::write_str(writer, &info.name).map_err(encode_error)?;
    }

    rmp::encode::write_array_len(writer, len_u32(snapshot.entities.len())?).map_err(encode_error)?;
    for entity in &snapshot.entities {
        rmp::encode::write_u32(writer, entity.local_id).map_err(encode_error)?;
        rmp::encode::write_array_len(writer, len_u32(entity.components.len())?).map_err(encode_error)?;
        for component in &entity.components {
            rmp::encode::write_u32(writer, component.component).map_err(encode_error)?;
            rmp::encode::write_bin(writer, &component.data).map_err(encode_error)?;
        }
    }
    Ok(())
}

/// Reads a snapshot from any byte source.
///
/// Every component info read back is marked used, and every entity's
/// live ID is null until the snapshot is restored.
///
/// # Errors
///
/// Returns [`EcpsError::Decode`] on truncated or malformed input.
pub fn read_snapshot<R: Read>(reader: &mut R) -> EcpsResult<SerializedEcps> {
    let component_count = rmp::decode::read_array_len(reader).map_err(decode_error)? as usize;
    let mut components = Vec::with_capacity(component_count.min(MAX_PREALLOC));
    for _ in 0..component_count {
        let internal_id = rmp::decode::read_int(reader).map_err(decode_error)?;
        let version = rmp::decode::read_int(reader).map_err(decode_error)?;
        let name_len = rmp::decode::read_str_len(reader).map_err(decode_error)? as usize;
        let name = String::from_utf8(read_bytes(reader, name_len)?).map_err(decode_error)?;
        components.push(SerializedComponentInfo {
            internal_id,
            name,
            version,
            used: true,
        });
    }

    let entity_count = rmp::decode::read_array_len(reader).map_err(decode_error)? as usize;
    let mut entities = Vec::with_capacity(entity_count.min(MAX_PREALLOC));
    for _ in 0..entity_count {
        let local_id = rmp::decode::read_int(reader).map_err(decode_error)?;
        let count = rmp::decode::read_array_len(reader).map_err(decode_error)? as usize;
        let mut entity_components = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            let component = rmp::decode::read_int(reader).map_err(decode_error)?;
            let len = rmp::decode::read_bin_len(reader).map_err(decode_error)? as usize;
            let data = read_bytes(reader, len)?;
            entity_components.push(SerializedComponent { component, data });
        }
        entities.push(SerializedEntityInfo {
            local_id,
            live_id: EntityId::NULL,
            components: entity_components,
        });
    }

    Ok(SerializedEcps { components, entities })
}

fn read_bytes<R: Read>(reader: &mut R, len: usize) -> EcpsResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOC * 64));
    reader.take(len as u64).read_to_end(&mut bytes).map_err(decode_error)?;
    if bytes.len() == len {
        Ok(bytes)
    } else {
        Err(EcpsError::Decode(format!("need {len} bytes, got {}", bytes.len())))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Saves a snapshot to a file.
///
/// # Errors
///
/// Returns [`EcpsError::Io`] or [`EcpsError::Encode`]. No partial file is
/// left behind on failure.
pub fn save_snapshot(path: impl AsRef<Path>, snapshot: &SerializedEcps) -> EcpsResult<()> {
    let path = path.as_ref();
    let tmp = temp_path(path);

    let result = (|| -> EcpsResult<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write_snapshot(&mut writer, snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        std::fs::rename(&tmp, path)?;
        Ok(())
    })();

    if let Err(err) = &result {
        tracing::error!(path = %path.display(), %err, "failed to save snapshot");
        std::fs::remove_file(&tmp).ok();
    } else {
        tracing::debug!(path = %path.display(), entities = snapshot.entity_count(), "snapshot saved");
    }
    result
}

/// Loads a snapshot from a file.
///
/// # Errors
///
/// Returns [`EcpsError::Io`] or [`EcpsError::Decode`].
pub fn load_snapshot(path: impl AsRef<Path>) -> EcpsResult<SerializedEcps> {
    let path = path.as_ref();
    let result = File::open(path)
        .map_err(EcpsError::from)
        .and_then(|file| read_snapshot(&mut BufReader::new(file)));

    match &result {
        Ok(snapshot) => tracing::debug!(path = %path.display(), entities = snapshot.entity_count(), "snapshot loaded"),
        Err(err) => tracing::error!(path = %path.display(), %err, "failed to load snapshot"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SerializedEcps {
        SerializedEcps {
            components: vec![
                SerializedComponentInfo { internal_id: 0, name: "ID".into(), version: 0, used: false },
                SerializedComponentInfo { internal_id: 1, name: "Enabled".into(), version: 0, used: true },
                SerializedComponentInfo { internal_id: 2, name: "pos".into(), version: 3, used: true },
            ],
            entities: vec![
                SerializedEntityInfo {
                    local_id: 1,
                    live_id: EntityId::new(5, 1),
                    components: vec![
                        SerializedComponent { component: 1, data: Vec::new() },
                        SerializedComponent { component: 2, data: vec![1, 2, 3] },
                    ],
                },
                SerializedEntityInfo { local_id: 2, live_id: EntityId::new(6, 1), components: Vec::new() },
            ],
        }
    }

    #[test]
    fn test_only_used_types_are_written() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &sample()).unwrap();
        let loaded = read_snapshot(&mut bytes.as_slice()).unwrap();

        assert_eq!(loaded.components.len(), 2);
        assert_eq!(loaded.components[0].name, "Enabled");
        assert_eq!(loaded.components[1].version, 3);
        assert!(loaded.components.iter().all(|info| info.used));
    }

    #[test]
    fn test_entities_come_back_without_live_ids() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &sample()).unwrap();
        let loaded = read_snapshot(&mut bytes.as_slice()).unwrap();

        assert_eq!(loaded.entities.len(), 2);
        assert!(loaded.entities.iter().all(|info| info.live_id.is_null()));
        assert_eq!(loaded.entities[0].components, sample().entities[0].components);
        assert!(loaded.entities[1].components.is_empty());
    }

    #[test]
    fn test_layout_matches_messagepack() {
        let snapshot = SerializedEcps {
            components: vec![SerializedComponentInfo { internal_id: 2, name: "a".into(), version: 1, used: true }],
            entities: vec![SerializedEntityInfo {
                local_id: 1,
                live_id: EntityId::NULL,
                components: vec![SerializedComponent { component: 2, data: vec![0xAB] }],
            }],
        };
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &snapshot).unwrap();

        #[rustfmt::skip]
        let expected = [
            0x91,                               // array(1)
            0xce, 0, 0, 0, 2,                   // u32 internal id
            0xce, 0, 0, 0, 1,                   // u32 version
            0xa1, b'a',                         // str "a"
            0x91,                               // array(1)
            0xce, 0, 0, 0, 1,                   // u32 local id
            0x91,                               // array(1)
            0xce, 0, 0, 0, 2,                   // u32 component
            0xc4, 1, 0xAB,                      // bin
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let mut bytes = Vec::new();
        write_snapshot(&mut bytes, &sample()).unwrap();
        for cut in [1, bytes.len() / 2, bytes.len() - 1] {
            assert!(read_snapshot(&mut &bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_failed_save_leaves_no_file() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir()
            .join(format!("ecps_missing_dir_{nanos}"))
            .join("save.ecps");

        assert!(matches!(save_snapshot(&path, &sample()), Err(EcpsError::Io(_))));
        assert!(!path.exists());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = std::env::temp_dir().join("ecps_definitely_missing.ecps");
        assert!(matches!(load_snapshot(&path), Err(EcpsError::Io(_))));
    }
}
