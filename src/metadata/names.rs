//! Class and type name conversions.
//!
//! Dalvik code refers to classes in *internal* descriptor form (`Ljava/lang/String;`,
//! `[I`), while reflection APIs such as `Class.forName` take *binary* names
//! (`java.lang.String`, `[I`). These helpers convert between the two and answer
//! simple structural questions about descriptors.

/// Converts a binary class name to its internal descriptor.
///
/// Array names are already descriptor shaped in binary form and only need their
/// package separators rewritten.
///
/// # Examples
///
/// ```rust
/// use smaliscope::metadata::binary_to_internal;
///
/// assert_eq!(binary_to_internal("java.lang.String"), "Ljava/lang/String;");
/// assert_eq!(binary_to_internal("[Ljava.lang.Object;"), "[Ljava/lang/Object;");
/// assert_eq!(binary_to_internal("[I"), "[I");
/// ```
#[must_use]
pub fn binary_to_internal(binary: &str) -> String {
    if binary.starts_with('[') {
        binary.replace('.', "/")
    } else {
        format!("L{};", binary.replace('.', "/"))
    }
}

/// Converts an internal descriptor to the binary name reported by `Class.getName()`.
///
/// # Examples
///
/// ```rust
/// use smaliscope::metadata::internal_to_binary;
///
/// assert_eq!(internal_to_binary("Ljava/lang/String;"), "java.lang.String");
/// assert_eq!(internal_to_binary("[Ljava/lang/String;"), "[Ljava.lang.String;");
/// assert_eq!(internal_to_binary("I"), "I");
/// ```
#[must_use]
pub fn internal_to_binary(internal: &str) -> String {
    if internal.starts_with('[') {
        return internal.replace('/', ".");
    }
    match internal.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(body) => body.replace('/', "."),
        None => internal.to_string(),
    }
}

/// Converts an internal descriptor to Java source notation.
///
/// ```rust
/// use smaliscope::metadata::internal_to_source;
///
/// assert_eq!(internal_to_source("[[I"), "int[][]");
/// assert_eq!(internal_to_source("Ljava/util/List;"), "java.util.List");
/// ```
#[must_use]
pub fn internal_to_source(internal: &str) -> String {
    let dimensions = array_dimensions(internal);
    let base = component_base(internal);
    let name = match base {
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "S" => "short".to_string(),
        "C" => "char".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        "V" => "void".to_string(),
        other => internal_to_binary(other),
    };
    let mut source = name;
    for _ in 0..dimensions {
        source.push_str("[]");
    }
    source
}

/// Number of leading `[` in a descriptor.
#[must_use]
pub fn array_dimensions(descriptor: &str) -> usize {
    descriptor.bytes().take_while(|b| *b == b'[').count()
}

/// Strips every array dimension from a descriptor.
#[must_use]
pub fn component_base(descriptor: &str) -> &str {
    descriptor.trim_start_matches('[')
}

/// Returns `true` for array descriptors.
#[must_use]
pub fn is_array(descriptor: &str) -> bool {
    descriptor.starts_with('[')
}

/// Returns `true` for the single-character primitive descriptors, `V` included.
#[must_use]
pub fn is_primitive(descriptor: &str) -> bool {
    matches!(
        descriptor,
        "Z" | "B" | "S" | "C" | "I" | "J" | "F" | "D" | "V"
    )
}

/// Returns `true` for descriptors that occupy a register pair.
#[must_use]
pub fn is_wide(descriptor: &str) -> bool {
    matches!(descriptor, "J" | "D")
}

/// Splits a concatenated parameter descriptor list, e.g. `I[JLjava/lang/String;`.
///
/// Returns `None` when the list is not a well-formed sequence of descriptors.
#[must_use]
pub fn split_descriptors(list: &str) -> Option<Vec<String>> {
    let bytes = list.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let start = pos;
        while pos < bytes.len() && bytes[pos] == b'[' {
            pos += 1;
        }
        match bytes.get(pos)? {
            b'L' => {
                let end = list[pos..].find(';')?;
                pos += end + 1;
            }
            b'Z' | b'B' | b'S' | b'C' | b'I' | b'J' | b'F' | b'D' => pos += 1,
            _ => return None,
        }
        out.push(list[start..pos].to_string());
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_names_round_trip_through_internal_form() {
        for name in ["java.lang.String", "com.example.a.b$Inner", "[[Ljava.lang.Object;"] {
            assert_eq!(internal_to_binary(&binary_to_internal(name)), name);
        }
    }

    #[test]
    fn source_notation_handles_primitive_arrays() {
        assert_eq!(internal_to_source("[B"), "byte[]");
        assert_eq!(internal_to_source("Z"), "boolean");
        assert_eq!(internal_to_source("[Lcom/example/Foo;"), "com.example.Foo[]");
    }

    #[test]
    fn descriptor_lists_split_on_boundaries() {
        assert_eq!(
            split_descriptors("I[JLjava/lang/String;[[Z").unwrap(),
            vec!["I", "[J", "Ljava/lang/String;", "[[Z"]
        );
        assert_eq!(split_descriptors("").unwrap(), Vec::<String>::new());
        assert!(split_descriptors("Ljava/lang/String").is_none());
        assert!(split_descriptors("Q").is_none());
    }

    #[test]
    fn structural_predicates() {
        assert!(is_wide("J"));
        assert!(!is_wide("I"));
        assert!(is_primitive("V"));
        assert!(!is_primitive("[I"));
        assert_eq!(array_dimensions("[[[I"), 3);
        assert_eq!(component_base("[[Ljava/lang/Class;"), "Ljava/lang/Class;");
    }
}
