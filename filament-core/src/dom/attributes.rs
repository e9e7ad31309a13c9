//! Attribute-to-property name table.
//!
//! The node reconciler consults this when mirroring an attribute update onto
//! the owning element's live property. Names that reflect one-to-one fall
//! through unchanged.

/// Map an attribute name to the reflected element property name.
pub fn reflected_property(attribute: &str) -> &str {
    match attribute {
        "accept-charset" => "acceptCharset",
        "accesskey" => "accessKey",
        "bgcolor" => "bgColor",
        "class" => "className",
        "contenteditable" => "contentEditable",
        "crossorigin" => "crossOrigin",
        "datetime" => "dateTime",
        "dirname" => "dirName",
        "enterkeyhint" => "enterKeyHint",
        "for" => "htmlFor",
        "formaction" => "formAction",
        "formenctype" => "formEncType",
        "formmethod" => "formMethod",
        "formtarget" => "formTarget",
        "formvalidate" => "formValidate",
        "http-equiv" => "httpEquiv",
        "inputmode" => "inputMode",
        "ismap" => "isMap",
        "maxlength" => "maxLength",
        "minlength" => "minLength",
        "novalidate" => "noValidate",
        "playsinline" => "playsInLine",
        "readonly" => "readOnly",
        "referrerpolicy" => "referrerPolicy",
        "rowspan" => "rowSpan",
        "tabindex" => "tabIndex",
        "usemap" => "useMap",
        other => other,
    }
}
