mod converters;
mod error;
mod wire;

pub use converters::Converters;
pub use error::{BindingError, ConversionError};
pub use wire::{UploadedFile, WireValue};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use tether_shared::{PropertyPath, Segment};

/// A value that can receive a property path assignment.
///
/// `path` is what is left of the property path below this value; an empty
/// path means this value itself is the leaf being assigned. Implemented for
/// scalars, `Option`, `Vec` and [`UploadedFile`]; use [`bindable!`] for
/// structs.
///
/// [`bindable!`]: crate::bindable
pub trait Bindable: Serialize + DeserializeOwned + Send + 'static {
    fn bind(&mut self, path: &[Segment], value: &WireValue, cx: &BindCx<'_>)
        -> Result<(), BindingError>;
}

/// Parses a leaf from the text a form field carries
pub trait FromWire: Sized + 'static {
    fn from_text(text: &str) -> Option<Self>;
}

/// Everything a [`Bindable`] needs besides the value: the converter registry
/// and the full path, for error messages.
pub struct BindCx<'a> {
    converters: &'a Converters,
    path: &'a PropertyPath,
}

impl<'a> BindCx<'a> {
    pub fn new(converters: &'a Converters, path: &'a PropertyPath) -> Self {
        Self { converters, path }
    }

    pub fn path(&self) -> &PropertyPath {
        self.path
    }

    /// Converts a leaf value: a registered converter wins, then a JSON value
    /// that already has the target's shape, then text parsing. Mappers for
    /// the type run on the result.
    pub fn convert<T>(&self, value: &WireValue) -> Result<T, BindingError>
    where
        T: FromWire + DeserializeOwned,
    {
        let converted = match self.converters.convert::<T>(value) {
            Some(converted) => converted,
            None => match value {
                WireValue::Json(Value::String(text)) => T::from_text(text)
                    .or_else(|| serde_json::from_value(Value::String(text.clone())).ok()),
                WireValue::Json(json) => serde_json::from_value::<T>(json.clone())
                    .ok()
                    .or_else(|| match json {
                        Value::Number(_) | Value::Bool(_) => T::from_text(&json.to_string()),
                        _ => None,
                    }),
                WireValue::Text(text) => T::from_text(text),
                WireValue::Many(items) => items.last().and_then(|text| T::from_text(text)),
                WireValue::Files(_) | WireValue::Null => None,
            },
        };

        converted
            .map(|converted| self.converters.apply_mapper(converted))
            .ok_or_else(|| self.conversion_error::<T>(value))
    }

    /// Assigns a whole value, only possible from JSON
    pub fn bind_whole<T: DeserializeOwned>(
        &self,
        target: &mut T,
        value: &WireValue,
    ) -> Result<(), BindingError> {
        match value {
            WireValue::Json(json) => {
                *target = serde_json::from_value(json.clone())
                    .map_err(|_| self.conversion_error::<T>(value))?;
                Ok(())
            }
            _ => Err(BindingError::NotALeaf {
                path: self.path.to_string(),
                segment: self.last_segment(),
            }),
        }
    }

    pub fn conversion_error<T>(&self, value: &WireValue) -> BindingError {
        BindingError::Conversion(ConversionError {
            path: self.path.to_string(),
            segment: self.last_segment(),
            target: short_type_name::<T>(),
            value: value.describe(),
        })
    }

    pub fn no_such_property(&self, segment: &Segment) -> BindingError {
        BindingError::NoSuchProperty {
            path: self.path.to_string(),
            segment: segment.to_string(),
        }
    }

    pub fn not_indexable(&self, segment: &Segment) -> BindingError {
        BindingError::NotIndexable {
            path: self.path.to_string(),
            segment: segment.to_string(),
        }
    }

    /// Fails unless `path` is empty, for values that have no children
    pub fn expect_leaf(&self, path: &[Segment]) -> Result<(), BindingError> {
        match path.first() {
            None => Ok(()),
            Some(segment @ Segment::Index(_)) => Err(self.not_indexable(segment)),
            Some(segment) => Err(self.no_such_property(segment)),
        }
    }

    fn last_segment(&self) -> String {
        self.path
            .segments()
            .last()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    match full.find('<') {
        Some(generic) => full[..generic].rsplit("::").next().unwrap_or(full),
        None => full.rsplit("::").next().unwrap_or(full),
    }
}

macro_rules! impl_parse_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromWire for $ty {
                fn from_text(text: &str) -> Option<Self> {
                    text.trim().parse().ok()
                }
            }

            impl Bindable for $ty {
                fn bind(
                    &mut self,
                    path: &[Segment],
                    value: &WireValue,
                    cx: &BindCx<'_>,
                ) -> Result<(), BindingError> {
                    cx.expect_leaf(path)?;
                    *self = cx.convert(value)?;
                    Ok(())
                }
            }
        )*
    };
}

impl_parse_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl FromWire for String {
    fn from_text(text: &str) -> Option<Self> {
        Some(text.to_string())
    }
}

impl FromWire for bool {
    fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => Some(true),
            "false" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl FromWire for char {
    fn from_text(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        let first = chars.next()?;
        chars.next().is_none().then_some(first)
    }
}

macro_rules! impl_bind_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn bind(
                    &mut self,
                    path: &[Segment],
                    value: &WireValue,
                    cx: &BindCx<'_>,
                ) -> Result<(), BindingError> {
                    cx.expect_leaf(path)?;
                    *self = cx.convert(value)?;
                    Ok(())
                }
            }
        )*
    };
}

impl_bind_leaf!(String, bool, char);

impl<T: Bindable + Default> Bindable for Option<T> {
    fn bind(
        &mut self,
        path: &[Segment],
        value: &WireValue,
        cx: &BindCx<'_>,
    ) -> Result<(), BindingError> {
        if path.is_empty() && value.is_empty() {
            *self = None;
            return Ok(());
        }
        match self {
            Some(inner) => inner.bind(path, value, cx),
            None => {
                let mut inner = T::default();
                inner.bind(path, value, cx)?;
                *self = Some(inner);
                Ok(())
            }
        }
    }
}

impl<T: Bindable + Default> Bindable for Vec<T> {
    fn bind(
        &mut self,
        path: &[Segment],
        value: &WireValue,
        cx: &BindCx<'_>,
    ) -> Result<(), BindingError> {
        match path.split_first() {
            None => {
                let mut items = Vec::new();
                for item in value.items() {
                    let mut converted = T::default();
                    converted.bind(&[], &item, cx)?;
                    items.push(converted);
                }
                *self = items;
                Ok(())
            }
            Some((segment @ Segment::Index(index), rest)) => {
                let len = self.len();
                match self.get_mut(*index) {
                    Some(item) => item.bind(rest, value, cx),
                    None => Err(BindingError::IndexOutOfRange {
                        path: cx.path().to_string(),
                        segment: segment.to_string(),
                        len,
                    }),
                }
            }
            Some((segment, _)) => Err(cx.not_indexable(segment)),
        }
    }
}

impl Bindable for UploadedFile {
    fn bind(
        &mut self,
        path: &[Segment],
        value: &WireValue,
        cx: &BindCx<'_>,
    ) -> Result<(), BindingError> {
        cx.expect_leaf(path)?;
        match value {
            WireValue::Files(files) if files.len() == 1 => {
                *self = files[0].clone();
                Ok(())
            }
            _ => Err(cx.conversion_error::<UploadedFile>(value)),
        }
    }
}

/// Implements [`Bindable`] for a struct by listing the fields paths may
/// descend into.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Line {
///     name: String,
///     quantity: u32,
/// }
///
/// tether_server::bindable!(Line { name, quantity });
/// ```
#[macro_export]
macro_rules! bindable {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Bindable for $ty {
            fn bind(
                &mut self,
                path: &[$crate::shared::Segment],
                value: &$crate::WireValue,
                cx: &$crate::BindCx<'_>,
            ) -> ::std::result::Result<(), $crate::BindingError> {
                match path.split_first() {
                    ::std::option::Option::Some(($crate::shared::Segment::Field(name), rest)) => {
                        match name.as_str() {
                            $(
                                stringify!($field) => $crate::Bindable::bind(&mut self.$field, rest, value, cx),
                            )*
                            _ => ::std::result::Result::Err(cx.no_such_property(&path[0])),
                        }
                    }
                    ::std::option::Option::Some((segment, _)) => {
                        ::std::result::Result::Err(cx.not_indexable(segment))
                    }
                    ::std::option::Option::None => cx.bind_whole(self, value),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Line {
        name: String,
        quantity: u32,
        note: Option<String>,
    }

    crate::bindable!(Line { name, quantity, note });

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Order {
        lines: Vec<Line>,
        attachment: Option<UploadedFile>,
        gallery: Vec<UploadedFile>,
    }

    crate::bindable!(Order { lines, attachment, gallery });

    fn bind(target: &mut Order, path: &str, value: WireValue) -> Result<(), BindingError> {
        bind_with(&Converters::new(), target, path, value)
    }

    fn bind_with(
        converters: &Converters,
        target: &mut Order,
        path: &str,
        value: WireValue,
    ) -> Result<(), BindingError> {
        let path = PropertyPath::parse(path)?;
        let cx = BindCx::new(converters, &path);
        // the root segment is resolved by the component descriptor; here the
        // order itself plays that role
        target.bind(path.segments(), &value, &cx)
    }

    fn order() -> Order {
        Order {
            lines: vec![Line::default(), Line::default(), Line::default()],
            ..Order::default()
        }
    }

    #[test]
    fn binds_through_lists_and_fields() {
        let mut order = order();
        bind(&mut order, "lines[2].name", "Tea".into()).unwrap();
        bind(&mut order, "lines[2].quantity", " 4 ".into()).unwrap();
        assert_eq!(order.lines[2].name, "Tea");
        assert_eq!(order.lines[2].quantity, 4);
    }

    #[test]
    fn binding_is_idempotent() {
        let mut once = order();
        bind(&mut once, "lines[1].name", "x".into()).unwrap();
        let mut twice = order();
        bind(&mut twice, "lines[1].name", "x".into()).unwrap();
        bind(&mut twice, "lines[1].name", "x".into()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn structural_errors_name_the_segment() {
        let mut order = order();
        assert_eq!(
            bind(&mut order, "lines[7].name", "x".into()),
            Err(BindingError::IndexOutOfRange {
                path: "lines[7].name".into(),
                segment: "[7]".into(),
                len: 3,
            })
        );
        assert_eq!(
            bind(&mut order, "lines[0].colour", "x".into()),
            Err(BindingError::NoSuchProperty {
                path: "lines[0].colour".into(),
                segment: "colour".into(),
            })
        );
        assert!(matches!(
            bind(&mut order, "lines[0].name[1]", "x".into()),
            Err(BindingError::NotIndexable { .. })
        ));
        assert!(matches!(
            bind(&mut order, "lines[0]", "x".into()),
            Err(BindingError::NotALeaf { .. })
        ));
    }

    #[test]
    fn conversion_errors_name_the_leaf() {
        let mut order = order();
        let err = bind(&mut order, "lines[0].quantity", "lots".into()).unwrap_err();
        let BindingError::Conversion(conversion) = err else {
            panic!("expected a conversion error");
        };
        assert_eq!(conversion.segment, "quantity");
        assert_eq!(conversion.target, "u32");
        assert_eq!(order.lines[0].quantity, 0);
    }

    #[test]
    fn json_values_of_the_right_type_bind_directly() {
        let mut order = order();
        bind(&mut order, "lines[0].quantity", json!(9).into()).unwrap();
        bind(&mut order, "lines[0].name", json!(12).into()).unwrap();
        bind(
            &mut order,
            "lines[1]",
            json!({"name": "Scone", "quantity": 2, "note": null}).into(),
        )
        .unwrap();
        assert_eq!(order.lines[0].quantity, 9);
        assert_eq!(order.lines[0].name, "12");
        assert_eq!(order.lines[1].name, "Scone");
    }

    #[test]
    fn empty_values_clear_options() {
        let mut order = order();
        bind(&mut order, "lines[0].note", "remember".into()).unwrap();
        assert_eq!(order.lines[0].note.as_deref(), Some("remember"));
        bind(&mut order, "lines[0].note", "".into()).unwrap();
        assert_eq!(order.lines[0].note, None);
    }

    #[test]
    fn file_selections_bind_to_files() {
        let file = UploadedFile {
            file_name: "a.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let mut order = order();
        bind(&mut order, "attachment", WireValue::Files(vec![file.clone()])).unwrap();
        bind(
            &mut order,
            "gallery",
            WireValue::Files(vec![file.clone(), file.clone()]),
        )
        .unwrap();
        assert_eq!(order.attachment.as_ref(), Some(&file));
        assert_eq!(order.gallery.len(), 2);

        bind(&mut order, "attachment", WireValue::Files(Vec::new())).unwrap();
        bind(&mut order, "gallery", WireValue::Files(Vec::new())).unwrap();
        assert_eq!(order.attachment, None);
        assert!(order.gallery.is_empty());
    }

    #[test]
    fn registered_converters_and_mappers_apply() {
        let mut converters = Converters::new();
        converters.register::<u32, _>(|value| match value {
            WireValue::Text(text) => text.strip_suffix(" pcs")?.parse().ok(),
            _ => None,
        });
        converters.map::<String, _>(|text| text.trim().to_string());

        let mut order = order();
        bind_with(&converters, &mut order, "lines[0].quantity", "3 pcs".into()).unwrap();
        bind_with(&converters, &mut order, "lines[0].name", "  Tea  ".into()).unwrap();
        assert_eq!(order.lines[0].quantity, 3);
        assert_eq!(order.lines[0].name, "Tea");
        assert!(bind_with(&converters, &mut order, "lines[0].quantity", "3".into()).is_err());
    }
}
