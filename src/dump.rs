//! Text rendering of decode results (dump files, `-v` output).

use crate::codec::DecodeResult;
use crate::value::Value;

fn format_scalar(v: &Value) -> String {
    match v {
        Value::U8(x) => format!("{}", x),
        Value::U16(x) => format!("{}", x),
        Value::U32(x) => format!("{}", x),
        Value::U64(x) => format!("{}", x),
        Value::I64(x) => format!("{}", x),
        Value::Bool(x) => format!("{}", x),
        Value::Double(x) => format!("{}", x),
        Value::Str(s) => s.clone(),
        _ => format!("{:?}", v),
    }
}

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Format a value; structs and lists span several lines, keys sorted.
pub fn value_to_dump(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Bytes(b) => format!("{}hex({})", pad, hex_string(b)),
        Value::Struct(m) => {
            let mut lines: Vec<String> = vec![format!("{}struct {{", pad)];
            let mut entries: Vec<_> = m.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (k, val) in entries {
                let sub = value_to_dump(val, indent + 1);
                lines.push(format!("{}  {}: {}", pad, k, sub.trim_start()));
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        Value::List(lst) => {
            if lst.is_empty() {
                return format!("{}[]", pad);
            }
            let mut lines: Vec<String> = vec![format!("{}[", pad)];
            for (i, item) in lst.iter().enumerate() {
                let sub = value_to_dump(item, indent + 1);
                lines.push(format!("{}  [{}] {}", pad, i, sub.trim_start()));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        scalar => format!("{}{}", pad, format_scalar(scalar)),
    }
}

/// One block per header: `[n] id (name)`, its fields, then its errors.
pub fn results_to_dump(results: &[DecodeResult]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("[{}] {} ({})\n", i, r.id, r.name));
        out.push_str(&value_to_dump(&r.data, 1));
        out.push('\n');
        for e in &r.errors {
            out.push_str(&format!("  ! {}\n", e));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecErrorInfo;
    use crate::value::object;

    #[test]
    fn nested_struct_keys_are_sorted() {
        let v = object([
            ("ttl", Value::U8(64)),
            ("flags", object([("df", Value::Bool(true))])),
            ("options", Value::Bytes(vec![1, 0xab])),
        ]);
        assert_eq!(
            value_to_dump(&v, 0),
            "struct {\n  flags: struct {\n    df: true\n  }\n  options: hex(01 ab)\n  ttl: 64\n}"
        );
    }

    #[test]
    fn results_list_errors_after_fields() {
        let results = vec![DecodeResult {
            id: "raw".to_string(),
            name: "Raw Data".to_string(),
            nickname: "RAW".to_string(),
            protocol: false,
            errors: vec![CodecErrorInfo {
                id: "raw".to_string(),
                path: String::new(),
                message: "Header consumed no bytes".to_string(),
            }],
            data: object([("data", Value::Bytes(vec![]))]),
        }];
        assert_eq!(
            results_to_dump(&results),
            "[0] raw (Raw Data)\n  struct {\n    data: hex()\n  }\n  ! raw: Header consumed no bytes\n"
        );
    }
}
