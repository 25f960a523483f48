use std::borrow::Cow;
use std::io::{self, Read};
use std::mem::align_of;

use zerocopy::{FromBytes, LayoutVerified};

/// Bytes before the first nul. `None` if the field has no terminator.
pub fn null_terminated_prefix(bytes: &[u8]) -> Option<&[u8]> {
    let end = bytes.iter().position(|&b| b == 0)?;
    Some(&bytes[..end])
}

/// Fixed-size name field. Names that fill the whole field are accepted as is.
pub fn fixed_name(bytes: &[u8]) -> Cow<str> {
    let name = null_terminated_prefix(bytes).unwrap_or(bytes);
    String::from_utf8_lossy(name)
}

pub fn copy_aligned<A: maligned::Alignment>(bytes: &[u8]) -> Vec<u8> {
    let mut aligned = maligned::align_first::<u8, A>(bytes.len());
    aligned.extend_from_slice(bytes);

    assert!(aligned.as_ptr() as usize % align_of::<A>() == 0);

    aligned
}

pub fn read_aligned<A: maligned::Alignment>(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut bytes = maligned::align_first::<u8, A>(0);
    reader.read_to_end(&mut bytes)?;

    if bytes.as_ptr() as usize % align_of::<A>() != 0 {
        // vector reallocated, no longer aligned
        bytes = copy_aligned::<A>(&bytes);
    }

    Ok(bytes)
}

pub fn parse<T: FromBytes>(bytes: &[u8], offset: usize) -> Option<&T> {
    bytes
        .get(offset..)
        .and_then(LayoutVerified::<_, T>::new_from_prefix)
        .map(|(res, _)| res.into_ref())
}

pub fn parse_slice<T: FromBytes>(bytes: &[u8], offset: usize, count: usize) -> Option<&[T]> {
    if count == 0 {
        return Some(&[]);
    }

    bytes
        .get(offset..)
        .and_then(|bytes| LayoutVerified::new_slice_from_prefix(bytes, count))
        .map(|(res, _)| res.into_slice())
}

#[cfg(test)]
mod tests {
    use maligned::A4;

    use super::*;

    #[test]
    fn name_stops_at_nul() {
        assert_eq!(fixed_name(b"skull\0junk"), "skull");
        assert_eq!(fixed_name(b"full"), "full");
        assert_eq!(null_terminated_prefix(b"full"), None);
    }

    #[test]
    fn slices_are_bounds_checked() {
        let bytes = copy_aligned::<A4>(&[1, 0, 0, 0, 2, 0, 0, 0]);

        assert_eq!(parse_slice::<i32>(&bytes, 0, 2).map(<[i32]>::len), Some(2));
        assert!(parse_slice::<i32>(&bytes, 4, 2).is_none());
        assert!(parse_slice::<i32>(&bytes, 64, 0).is_some());
        assert!(parse::<i32>(&bytes, 8).is_none());
    }
}
