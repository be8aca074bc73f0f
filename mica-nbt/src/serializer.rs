use bytes::Bytes;
use serde::ser::Impossible;
use serde::{Serialize, ser};

use crate::tag::NbtTag;
use crate::writer::NbtWriter;
use crate::{
    BYTE_ARRAY_ID, BYTE_ID, COMPOUND_ID, DOUBLE_ID, END_ID, Endian, Error, FLOAT_ID, INT_ARRAY_ID,
    INT_ID, LIST_ID, LONG_ARRAY_ID, LONG_ID, NBT_ARRAY_TAG, NBT_BYTE_ARRAY_TAG, NBT_INT_ARRAY_TAG,
    NBT_LONG_ARRAY_TAG, SHORT_ID, STRING_ID,
};

pub type Result<T> = std::result::Result<T, Error>;

pub struct Serializer {
    output: NbtWriter,
    state: State,
    handled_root: bool,
    expected_list_tag: u8,
}

impl Serializer {
    pub fn new(name: Option<String>, endian: Endian) -> Self {
        Self {
            output: NbtWriter::with_endian(endian),
            state: State::Root(name),
            handled_root: false,
            expected_list_tag: 0,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        self.output.into_bytes()
    }
}

// NBT writes the tag id and name before the value, which is the opposite of
// the order serde hands them to us. State carries what still has to be
// emitted once the value (and with it the tag id) is known.
#[derive(Clone, Debug, PartialEq)]
enum State {
    // In network NBT the root name is not present
    Root(Option<String>),
    Named(String),
    // Used by maps, to check that the key is a String
    MapKey,
    FirstListElement {
        len: i32,
    },
    ListElement,
    CheckedListElement,
    Array {
        name: String,
        array_type: &'static str,
    },
}

impl Serializer {
    fn parse_state(&mut self, tag: u8) -> Result<()> {
        match &mut self.state {
            State::Named(name) | State::Array { name, .. } => {
                self.output.write_u8(tag);
                NbtTag::String(name.clone()).serialize_data(&mut self.output)?;
            }
            State::FirstListElement { len } => {
                let len = *len;
                self.output.write_u8(tag);
                self.output.write_i32(len);
                self.expected_list_tag = tag;
            }
            State::MapKey => {
                if tag != STRING_ID {
                    return Err(Error::SerdeError(format!(
                        "Map key can only be string, not {tag}"
                    )));
                }
            }
            State::ListElement => {
                // Rust rules mandate this is all the same type
            }
            State::CheckedListElement => {
                if tag != self.expected_list_tag {
                    return Err(Error::SerdeError(format!(
                        "List values must all be of the same type! Expected {} but found {}!",
                        self.expected_list_tag, tag
                    )));
                }
            }
            State::Root(root_name) => {
                if self.handled_root {
                    return Err(Error::SerdeError(
                        "Invalid state: already handled root component!".to_string(),
                    ));
                }
                if tag != COMPOUND_ID {
                    return Err(Error::SerdeError(format!(
                        "Invalid state: root is not a compound! ({tag})"
                    )));
                }
                let root_name = root_name.take();
                self.handled_root = true;
                self.output.write_u8(tag);
                if let Some(root_name) = root_name {
                    NbtTag::String(root_name).serialize_data(&mut self.output)?;
                }
            }
        };
        Ok(())
    }
}

/// Serializes a value to unnamed (network) NBT.
pub fn to_bytes_unnamed<T>(value: &T) -> Result<Bytes>
where
    T: Serialize,
{
    let mut serializer = Serializer::new(None, Endian::Big);
    value.serialize(&mut serializer)?;
    Ok(serializer.into_bytes())
}

/// Serializes a value to normal NBT with the given root name.
pub fn to_bytes_named<T>(value: &T, name: String) -> Result<Bytes>
where
    T: Serialize,
{
    let mut serializer = Serializer::new(Some(name), Endian::Big);
    value.serialize(&mut serializer)?;
    Ok(serializer.into_bytes())
}

/// Serializes a value to normal NBT with an empty root name.
pub fn to_bytes<T>(value: &T) -> Result<Bytes>
where
    T: Serialize,
{
    to_bytes_named(value, String::new())
}

impl ser::Serializer for &mut Serializer {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.serialize_i8(v as i8)?;
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.parse_state(BYTE_ID)?;
        self.output.write_i8(v);
        Ok(())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.parse_state(SHORT_ID)?;
        self.output.write_i16(v);
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.parse_state(INT_ID)?;
        self.output.write_i32(v);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.parse_state(LONG_ID)?;
        self.output.write_i64(v);
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        match self.state {
            State::Named(_) => Err(Error::UnsupportedType(
                "u8; NBT only supports signed values".to_string(),
            )),
            _ => {
                self.parse_state(BYTE_ID)?;
                self.output.write_u8(v);
                Ok(())
            }
        }
    }

    fn serialize_u16(self, _v: u16) -> Result<()> {
        Err(Error::UnsupportedType(
            "u16; NBT only supports signed values".to_string(),
        ))
    }

    fn serialize_u32(self, _v: u32) -> Result<()> {
        Err(Error::UnsupportedType(
            "u32; NBT only supports signed values".to_string(),
        ))
    }

    fn serialize_u64(self, _v: u64) -> Result<()> {
        Err(Error::UnsupportedType(
            "u64; NBT only supports signed values".to_string(),
        ))
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.parse_state(FLOAT_ID)?;
        self.output.write_f32(v);
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.parse_state(DOUBLE_ID)?;
        self.output.write_f64(v);
        Ok(())
    }

    fn serialize_char(self, _v: char) -> Result<()> {
        Err(Error::UnsupportedType("char".to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.parse_state(STRING_ID)?;

        if self.state == State::MapKey {
            self.state = State::Named(v.to_string());
        } else {
            NbtTag::String(v.to_string()).serialize_data(&mut self.output)?;
        }

        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.parse_state(LIST_ID)?;
        self.output.write_u8(BYTE_ID);

        let len = v.len();
        if len > i32::MAX as usize {
            return Err(Error::LargeLength(len));
        }

        self.output.write_i32(len as i32);
        self.output.write_slice(v);
        Ok(())
    }

    // Just skip serializing if the value is none
    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Err(Error::UnsupportedType("unit struct".to_string()))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.serialize_str(variant)?;
        Ok(())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, _value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        Err(Error::UnsupportedType("newtype struct".to_string()))
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        if name == NBT_ARRAY_TAG {
            let name = match self.state {
                State::Named(ref name) => name.clone(),
                _ => return Err(Error::SerdeError("Invalid Serializer state!".to_string())),
            };

            self.state = State::Array {
                name,
                array_type: variant,
            };
        } else {
            return Err(Error::UnsupportedType("newtype variant".to_string()));
        }
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        let Some(len) = len else {
            return Err(Error::SerdeError(
                "Length of the sequence must be known first!".to_string(),
            ));
        };
        if len > i32::MAX as usize {
            return Err(Error::LargeLength(len));
        }

        match &mut self.state {
            State::Array { array_type, .. } => {
                let (id, expected_tag) = match *array_type {
                    NBT_BYTE_ARRAY_TAG => (BYTE_ARRAY_ID, BYTE_ID),
                    NBT_INT_ARRAY_TAG => (INT_ARRAY_ID, INT_ID),
                    NBT_LONG_ARRAY_TAG => (LONG_ARRAY_ID, LONG_ID),
                    _ => {
                        return Err(Error::SerdeError(
                            "Array supports only byte, int, long".to_string(),
                        ));
                    }
                };

                self.parse_state(id)?;
                self.output.write_i32(len as i32);

                // Anything can be marked as an nbt array, so the first
                // element still has to be checked against the array kind
                self.expected_list_tag = expected_tag;
                self.state = State::CheckedListElement;
            }
            _ => {
                self.parse_state(LIST_ID)?;
                self.state = State::FirstListElement { len: len as i32 };
                if len == 0 {
                    // With no elements, the FirstListElement state is never
                    // reached; write the (unknown) list type and length here.
                    self.output.write_u8(END_ID);
                    self.output.write_i32(0);
                }
            }
        }

        Ok(self)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::UnsupportedType("tuple struct".to_string()))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::UnsupportedType("tuple variant".to_string()))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.parse_state(COMPOUND_ID)?;
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.parse_state(COMPOUND_ID)?;
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::UnsupportedType("struct variant".to_string()))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

impl ser::SerializeTuple for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> std::result::Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)?;
        self.state = State::CheckedListElement;
        Ok(())
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeSeq for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)?;
        self.state = State::ListElement;
        Ok(())
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.state = State::Named(key.to_string());
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.output.write_u8(END_ID);
        Ok(())
    }
}

impl ser::SerializeMap for &mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> std::result::Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.state = State::MapKey;
        key.serialize(&mut **self)
    }

    fn serialize_value<T>(&mut self, value: &T) -> std::result::Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.output.write_u8(END_ID);
        Ok(())
    }
}
