//! Builtin functions and members.

use abra_compiler::Builtin;
use abra_core::RuntimeError;

use crate::value::Value;

/// Run `builtin` on `args`, receiver first for members.
pub(crate) fn call(
    builtin: Builtin,
    args: &[Value],
    output: &mut dyn FnMut(&str),
) -> Result<Value, RuntimeError> {
    match (builtin, args) {
        (Builtin::Println, [value]) => {
            output(&value.to_string());
            Ok(Value::Unit)
        }
        (Builtin::Range, [Value::Int(from), Value::Int(to)]) => {
            Ok(Value::array((*from..*to).map(Value::Int).collect()))
        }
        (Builtin::ArrayLength, [Value::Array(items)]) => Ok(Value::Int(items.borrow().len() as i64)),
        (Builtin::ArrayPush, [Value::Array(items), item]) => {
            items.borrow_mut().push(item.clone());
            Ok(Value::Unit)
        }
        (Builtin::StringLength, [Value::Str(s)]) => Ok(Value::Int(s.chars().count() as i64)),
        (Builtin::StringToUpper, [Value::Str(s)]) => Ok(Value::string(s.to_uppercase())),
        (Builtin::StringToLower, [Value::Str(s)]) => Ok(Value::string(s.to_lowercase())),
        (builtin, args) => Err(RuntimeError::trap(format!(
            "builtin '{}' called with {} unsuitable arguments",
            builtin.name(),
            args.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(builtin: Builtin, args: &[Value]) -> Value {
        call(builtin, args, &mut |_| {}).expect("builtin succeeds")
    }

    #[test]
    fn println_writes_the_display_form() {
        let mut lines = Vec::new();
        let result = call(
            Builtin::Println,
            &[Value::array(vec![Value::string("a")])],
            &mut |line| lines.push(line.to_string()),
        );
        assert_eq!(result, Ok(Value::Unit));
        assert_eq!(lines, vec!["[\"a\"]".to_string()]);
    }

    #[test]
    fn range_is_end_exclusive() {
        assert_eq!(
            run(Builtin::Range, &[Value::Int(1), Value::Int(4)]),
            Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(run(Builtin::Range, &[Value::Int(3), Value::Int(1)]), Value::array(vec![]));
    }

    #[test]
    fn array_members() {
        let items = Value::array(vec![Value::Int(1)]);
        assert_eq!(run(Builtin::ArrayPush, &[items.clone(), Value::Int(2)]), Value::Unit);
        assert_eq!(run(Builtin::ArrayLength, &[items]), Value::Int(2));
    }

    #[test]
    fn string_members() {
        assert_eq!(run(Builtin::StringLength, &[Value::string("héllo")]), Value::Int(5));
        assert_eq!(run(Builtin::StringToUpper, &[Value::string("abc")]), Value::string("ABC"));
        assert_eq!(run(Builtin::StringToLower, &[Value::string("ABC")]), Value::string("abc"));
    }

    #[test]
    fn wrong_arguments_trap() {
        assert!(matches!(
            call(Builtin::Range, &[Value::Int(1)], &mut |_| {}),
            Err(RuntimeError::Trap { .. })
        ));
    }
}
