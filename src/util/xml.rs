use std::borrow::Cow;

/// Removes characters that are not allowed anywhere in an XML 1.0 document.
///
/// XML 1.0 permits only `\t`, `\n` and `\r` from the C0 control range, and
/// never `U+FFFE`/`U+FFFF`. File names and tag values can contain any of
/// these, and a single one makes the whole feed unparseable for clients, so
/// they are dropped before rendering. CDATA does not help here: the
/// restriction applies inside CDATA sections too.
///
/// # Returns
///
/// - `Cow::Borrowed(s)` when nothing needs stripping (no allocation)
/// - `Cow::Owned` with the offending characters removed otherwise
///
/// # Examples
///
/// ```
/// use podserve::util::strip_invalid_xml_chars;
///
/// assert_eq!(strip_invalid_xml_chars("plain"), "plain");
/// assert_eq!(strip_invalid_xml_chars("bad\x00name\x1b"), "badname");
/// ```
pub fn strip_invalid_xml_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_invalid_xml_char) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_invalid_xml_char(c)).collect())
}

fn is_invalid_xml_char(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

/// Wraps arbitrary text in a CDATA section.
///
/// A literal `]]>` inside the text would close the section early, so it is
/// split across two adjacent sections (`]]` ends the first, `>` starts the
/// second). Parsers concatenate adjacent sections back into the original
/// text.
///
/// # Examples
///
/// ```
/// use podserve::util::cdata;
///
/// assert_eq!(cdata("Episode 1"), "<![CDATA[Episode 1]]>");
/// assert_eq!(cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
/// ```
pub fn cdata(text: &str) -> String {
    let text = strip_invalid_xml_chars(text);
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// Escapes text for use in element content or a double-quoted attribute.
pub fn escape(text: &str) -> String {
    let text = strip_invalid_xml_chars(text);
    quick_xml::escape::escape(text.as_ref()).into_owned()
}
