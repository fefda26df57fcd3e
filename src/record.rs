//! The raw record tree consumed by the decoder.
//!
//! A [`Record`] is one node of the self-describing container produced by the
//! external file reader: a tag/num header plus either child records or a
//! typed payload. The decoder never reads files itself; a collaborator
//! implementing [`RecordSource`] hands it one top-level record at a time.

use std::fmt;

/// Payload type of a record, as declared by its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Leaf payload of 32-bit words.
    UInt32,
    /// Leaf payload of 64-bit words.
    ULong64,
    /// Container of child records without a `num` field.
    Segment,
    /// Container of child records.
    Bank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Children(Vec<Record>),
    UInt32(Vec<u32>),
    ULong64(Vec<u64>),
}

/// One node of the raw record tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    tag: u16,
    num: u8,
    data_type: DataType,
    payload: Payload,
}

impl Record {
    /// Creates a container record holding child records.
    pub fn bank(tag: u16, num: u8, children: Vec<Record>) -> Self {
        Self {
            tag,
            num,
            data_type: DataType::Bank,
            payload: Payload::Children(children),
        }
    }

    /// Creates a segment container holding child records.
    pub fn segment(tag: u16, children: Vec<Record>) -> Self {
        Self {
            tag,
            num: 0,
            data_type: DataType::Segment,
            payload: Payload::Children(children),
        }
    }

    /// Creates a leaf record carrying 32-bit words.
    pub fn leaf_u32(tag: u16, num: u8, words: Vec<u32>) -> Self {
        Self {
            tag,
            num,
            data_type: DataType::UInt32,
            payload: Payload::UInt32(words),
        }
    }

    /// Creates a leaf record carrying 64-bit words.
    pub fn leaf_u64(tag: u16, num: u8, words: Vec<u64>) -> Self {
        Self {
            tag,
            num,
            data_type: DataType::ULong64,
            payload: Payload::ULong64(words),
        }
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn num(&self) -> u8 {
        self.num
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Child records, or an empty slice for leaf records.
    pub fn children(&self) -> &[Record] {
        match &self.payload {
            Payload::Children(children) => children,
            _ => &[],
        }
    }

    /// 32-bit payload, or an empty slice when the payload is of another kind.
    pub fn uint32_data(&self) -> &[u32] {
        match &self.payload {
            Payload::UInt32(words) => words,
            _ => &[],
        }
    }

    /// 64-bit payload, or an empty slice when the payload is of another kind.
    pub fn ulong64_data(&self) -> &[u64] {
        match &self.payload {
            Payload::ULong64(words) => words,
            _ => &[],
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record tag={:#06x} num={} type={:?}",
            self.tag, self.num, self.data_type
        )?;
        match &self.payload {
            Payload::Children(children) => write!(f, " children={}", children.len()),
            Payload::UInt32(words) => write!(f, " words={}", words.len()),
            Payload::ULong64(words) => write!(f, " words={}", words.len()),
        }
    }
}

/// Contract for the external reader collaborator.
///
/// Implementations own the file format; the decoder only requires a stream
/// of parsed top-level records, with `None` signalling end of input.
pub trait RecordSource {
    fn next_record(&mut self) -> Option<Record>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_empty_for_other_payload_kinds() {
        let leaf = Record::leaf_u32(0x15, 0, vec![1, 2, 3]);
        assert_eq!(leaf.uint32_data(), &[1, 2, 3]);
        assert!(leaf.children().is_empty());
        assert!(leaf.ulong64_data().is_empty());

        let container = Record::bank(0xFF50, 1, vec![leaf.clone()]);
        assert_eq!(container.children().len(), 1);
        assert!(container.uint32_data().is_empty());

        let segment = Record::segment(0x20, vec![leaf]);
        assert_eq!(segment.data_type(), DataType::Segment);
        assert_eq!(segment.num(), 0);
        assert_eq!(segment.children()[0].uint32_data(), &[1, 2, 3]);
    }

    #[test]
    fn display_identifies_record() {
        let rec = Record::leaf_u64(0xFF21, 2, vec![42]);
        let text = rec.to_string();
        assert!(text.contains("0xff21"));
        assert!(text.contains("words=1"));
    }
}
