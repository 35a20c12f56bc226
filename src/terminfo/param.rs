//! Parameterized string evaluation
//!
//! Expands terminfo `%` templates such as `\E[%i%p1%d;%p2%dH` with runtime
//! arguments. The evaluator is a small stack machine: `%p<n>` pushes an
//! argument, operators pop their operands, and output conversions (`%d`,
//! `%s`, `%c`, ...) pop a value and append it to the result.

use thiserror::Error;

/// Argument or stack value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Number(i32),
    Text(String),
}

impl Default for Param {
    fn default() -> Self {
        Param::Number(0)
    }
}

impl From<i32> for Param {
    fn from(n: i32) -> Self {
        Param::Number(n)
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Text(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Text(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("stack underflow at offset {0}")]
    StackUnderflow(usize),

    #[error("operand has the wrong type at offset {0}")]
    TypeMismatch(usize),

    #[error("unrecognized operator '%{1}' at offset {0}")]
    UnknownOperator(usize, char),

    #[error("invalid variable name '{0}'")]
    InvalidVariable(char),

    #[error("template ends inside an operator")]
    UnexpectedEnd,
}

pub type Result<T> = std::result::Result<T, ParamError>;

/// Expand `template` with the given arguments (`%p1` is `args[0]`).
///
/// Missing arguments read as `0`.
pub fn evaluate(template: &str, args: &[Param]) -> Result<String> {
    let mut params: [Param; 9] = Default::default();
    for (slot, arg) in params.iter_mut().zip(args) {
        *slot = arg.clone();
    }
    Evaluator::new(template, params).run()
}

/// Output conversion options: `%[[:]flags][width[.precision]][doxXs]`
#[derive(Debug, Default, Clone, Copy)]
struct FormatSpec {
    left_align: bool,
    plus_sign: bool,
    space_sign: bool,
    alternate: bool,
    zero_pad: bool,
    width: usize,
    precision: Option<usize>,
    conversion: u8,
}

struct Evaluator<'a> {
    template: &'a str,
    bytes: &'a [u8],
    pos: usize,
    params: [Param; 9],
    stack: Vec<Param>,
    dynamic_vars: [Param; 26],
    static_vars: [Param; 26],
    out: String,
}

impl<'a> Evaluator<'a> {
    fn new(template: &'a str, params: [Param; 9]) -> Self {
        Self {
            template,
            bytes: template.as_bytes(),
            pos: 0,
            params,
            stack: Vec::with_capacity(8),
            dynamic_vars: Default::default(),
            static_vars: Default::default(),
            out: String::with_capacity(template.len() + 8),
        }
    }

    fn run(mut self) -> Result<String> {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] != b'%' {
                let end = self.bytes[self.pos..]
                    .iter()
                    .position(|&b| b == b'%')
                    .map_or(self.bytes.len(), |off| self.pos + off);
                self.out.push_str(&self.template[self.pos..end]);
                self.pos = end;
                continue;
            }

            let at = self.pos;
            self.pos += 1;
            let op = self.next_byte()?;
            self.execute(at, op)?;
        }
        Ok(self.out)
    }

    fn execute(&mut self, at: usize, op: u8) -> Result<()> {
        match op {
            b'%' => self.out.push('%'),
            b'c' => {
                let n = self.pop_number(at)?;
                self.out.push(char::from(n as u8));
            }
            b'd' | b'o' | b'x' | b'X' | b's' => {
                let spec = FormatSpec {
                    conversion: op,
                    ..Default::default()
                };
                self.format(at, spec)?;
            }
            b':' | b'#' | b' ' | b'.' | b'0'..=b'9' => {
                self.pos -= 1;
                let spec = self.parse_spec()?;
                self.format(at, spec)?;
            }
            b'p' => {
                let digit = self.next_byte()?;
                if !(b'1'..=b'9').contains(&digit) {
                    return Err(ParamError::UnknownOperator(at, 'p'));
                }
                self.stack.push(self.params[(digit - b'1') as usize].clone());
            }
            b'P' => {
                let name = self.next_byte()?;
                let value = self.pop(at)?;
                *self.variable(name)? = value;
            }
            b'g' => {
                let name = self.next_byte()?;
                let value = self.variable(name)?.clone();
                self.stack.push(value);
            }
            b'\'' => {
                let c = self.next_byte()?;
                if self.next_byte()? != b'\'' {
                    return Err(ParamError::UnknownOperator(at, '\''));
                }
                self.stack.push(Param::Number(i32::from(c)));
            }
            b'{' => {
                let start = self.pos;
                while self.bytes.get(self.pos).map_or(false, u8::is_ascii_digit) {
                    self.pos += 1;
                }
                let value = self.template[start..self.pos].parse::<i32>().unwrap_or(0);
                if self.next_byte()? != b'}' {
                    return Err(ParamError::UnknownOperator(at, '{'));
                }
                self.stack.push(Param::Number(value));
            }
            b'l' => match self.pop(at)? {
                Param::Text(s) => self.stack.push(Param::Number(s.len() as i32)),
                Param::Number(_) => return Err(ParamError::TypeMismatch(at)),
            },
            b'+' | b'-' | b'*' | b'/' | b'm' | b'&' | b'|' | b'^' | b'=' | b'>' | b'<'
            | b'A' | b'O' => {
                let rhs = self.pop_number(at)?;
                let lhs = self.pop_number(at)?;
                self.stack.push(Param::Number(binary_op(op, lhs, rhs)));
            }
            b'!' => {
                let n = self.pop_number(at)?;
                self.stack.push(Param::Number(i32::from(n == 0)));
            }
            b'~' => {
                let n = self.pop_number(at)?;
                self.stack.push(Param::Number(!n));
            }
            b'i' => {
                for param in self.params.iter_mut().take(2) {
                    if let Param::Number(n) = param {
                        *n = n.saturating_add(1);
                    }
                }
            }
            b'?' | b';' => {}
            b't' => {
                if self.pop_number(at)? == 0 {
                    self.skip_branch(true);
                }
            }
            // Reached only after a taken %t branch
            b'e' => self.skip_branch(false),
            other => return Err(ParamError::UnknownOperator(at, char::from(other))),
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Result<u8> {
        let b = *self.bytes.get(self.pos).ok_or(ParamError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(b)
    }

    fn pop(&mut self, at: usize) -> Result<Param> {
        self.stack.pop().ok_or(ParamError::StackUnderflow(at))
    }

    fn pop_number(&mut self, at: usize) -> Result<i32> {
        match self.pop(at)? {
            Param::Number(n) => Ok(n),
            Param::Text(_) => Err(ParamError::TypeMismatch(at)),
        }
    }

    fn variable(&mut self, name: u8) -> Result<&mut Param> {
        match name {
            b'a'..=b'z' => Ok(&mut self.dynamic_vars[(name - b'a') as usize]),
            b'A'..=b'Z' => Ok(&mut self.static_vars[(name - b'A') as usize]),
            other => Err(ParamError::InvalidVariable(char::from(other))),
        }
    }

    /// Move past the current branch: to just after the matching `%e`
    /// (when `stop_at_else`) or `%;` at the same nesting level.
    fn skip_branch(&mut self, stop_at_else: bool) {
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'%' {
                self.pos += 1;
                match self.bytes.get(self.pos) {
                    Some(b'?') => depth += 1,
                    Some(b';') if depth == 0 => {
                        self.pos += 1;
                        return;
                    }
                    Some(b';') => depth -= 1,
                    Some(b'e') if depth == 0 && stop_at_else => {
                        self.pos += 1;
                        return;
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
    }

    fn parse_spec(&mut self) -> Result<FormatSpec> {
        let mut spec = FormatSpec::default();
        if self.bytes.get(self.pos) == Some(&b':') {
            self.pos += 1;
        }
        loop {
            match self.bytes.get(self.pos) {
                Some(b'-') => spec.left_align = true,
                Some(b'+') => spec.plus_sign = true,
                Some(b' ') => spec.space_sign = true,
                Some(b'#') => spec.alternate = true,
                Some(b'0') => spec.zero_pad = true,
                _ => break,
            }
            self.pos += 1;
        }
        spec.width = self.parse_count();
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            spec.precision = Some(self.parse_count());
        }
        let at = self.pos;
        spec.conversion = self.next_byte()?;
        if !matches!(spec.conversion, b'd' | b'o' | b'x' | b'X' | b's') {
            return Err(ParamError::UnknownOperator(at, char::from(spec.conversion)));
        }
        Ok(spec)
    }

    fn parse_count(&mut self) -> usize {
        let mut n = 0usize;
        while let Some(d) = self.bytes.get(self.pos).filter(|b| b.is_ascii_digit()) {
            n = n.saturating_mul(10).saturating_add(usize::from(d - b'0'));
            self.pos += 1;
        }
        n
    }

    fn format(&mut self, at: usize, spec: FormatSpec) -> Result<()> {
        let body = match (spec.conversion, self.pop(at)?) {
            (b's', Param::Text(s)) => match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            },
            (b's', Param::Number(n)) => n.to_string(),
            (_, Param::Text(_)) => return Err(ParamError::TypeMismatch(at)),
            (conversion, Param::Number(n)) => format_number(n, conversion, &spec),
        };

        let len = body.chars().count();
        let pad = spec.width.saturating_sub(len);
        if spec.left_align {
            self.out.push_str(&body);
            self.out.extend(std::iter::repeat(' ').take(pad));
        } else {
            self.out.extend(std::iter::repeat(' ').take(pad));
            self.out.push_str(&body);
        }
        Ok(())
    }
}

fn format_number(n: i32, conversion: u8, spec: &FormatSpec) -> String {
    let (sign, digits) = match conversion {
        b'd' => {
            let sign = if n < 0 {
                "-"
            } else if spec.plus_sign {
                "+"
            } else if spec.space_sign {
                " "
            } else {
                ""
            };
            (sign, n.unsigned_abs().to_string())
        }
        b'o' => ("", format!("{:o}", n as u32)),
        b'x' => ("", format!("{:x}", n as u32)),
        _ => ("", format!("{:X}", n as u32)),
    };

    let prefix = match conversion {
        b'o' if spec.alternate && !digits.starts_with('0') => "0",
        b'x' if spec.alternate && n != 0 => "0x",
        b'X' if spec.alternate && n != 0 => "0X",
        _ => "",
    };
    let min_digits = match spec.precision {
        Some(p) => p,
        None if spec.zero_pad && !spec.left_align => {
            spec.width.saturating_sub(sign.len() + prefix.len())
        }
        None => 0,
    };
    let zeros = min_digits.saturating_sub(digits.len());

    let mut s = String::with_capacity(sign.len() + prefix.len() + zeros + digits.len());
    s.push_str(sign);
    s.push_str(prefix);
    s.extend(std::iter::repeat('0').take(zeros));
    s.push_str(&digits);
    s
}

fn binary_op(op: u8, lhs: i32, rhs: i32) -> i32 {
    match op {
        b'+' => lhs.wrapping_add(rhs),
        b'-' => lhs.wrapping_sub(rhs),
        b'*' => lhs.wrapping_mul(rhs),
        b'/' => lhs.checked_div(rhs).unwrap_or(0),
        b'm' => lhs.checked_rem(rhs).unwrap_or(0),
        b'&' => lhs & rhs,
        b'|' => lhs | rhs,
        b'^' => lhs ^ rhs,
        b'=' => i32::from(lhs == rhs),
        b'>' => i32::from(lhs > rhs),
        b'<' => i32::from(lhs < rhs),
        b'A' => i32::from(lhs != 0 && rhs != 0),
        _ => i32::from(lhs != 0 || rhs != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETAF_256: &str = "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m";

    #[test]
    fn test_cursor_address() {
        let s = evaluate("\x1b[%i%p1%d;%p2%dH", &[11.into(), 33.into()]).unwrap();
        assert_eq!(s, "\x1b[12;34H");
    }

    #[test]
    fn test_conditional_chain() {
        assert_eq!(evaluate(SETAF_256, &[1.into()]).unwrap(), "\x1b[31m");
        assert_eq!(evaluate(SETAF_256, &[9.into()]).unwrap(), "\x1b[91m");
        assert_eq!(evaluate(SETAF_256, &[100.into()]).unwrap(), "\x1b[38;5;100m");
    }

    #[test]
    fn test_string_argument() {
        let s = evaluate("\x1b]0;%p1%s\x07", &["build: ok".into()]).unwrap();
        assert_eq!(s, "\x1b]0;build: ok\x07");
    }

    #[test]
    fn test_formatted_output() {
        assert_eq!(evaluate("%p1%03d", &[7.into()]).unwrap(), "007");
        assert_eq!(evaluate("%p1%:-5d|", &[42.into()]).unwrap(), "42   |");
        assert_eq!(evaluate("%p1%#x", &[255.into()]).unwrap(), "0xff");
        assert_eq!(evaluate("%p1%5.2s|", &["abcdef".into()]).unwrap(), "   ab|");
    }

    #[test]
    fn test_constants_and_variables() {
        assert_eq!(evaluate("%{65}%c", &[]).unwrap(), "A");
        assert_eq!(evaluate("%'x'%c", &[]).unwrap(), "x");
        assert_eq!(evaluate("%p1%Pa%ga%ga%*%d", &[6.into()]).unwrap(), "36");
        assert_eq!(evaluate("%p1%l%d", &["four".into()]).unwrap(), "4");
        assert_eq!(evaluate("100%%", &[]).unwrap(), "100%");
    }

    #[test]
    fn test_missing_argument_reads_zero() {
        assert_eq!(evaluate("\x1b[3%p1%dm", &[]).unwrap(), "\x1b[30m");
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate("%d", &[]), Err(ParamError::StackUnderflow(0)));
        assert_eq!(evaluate("ab%z", &[]), Err(ParamError::UnknownOperator(2, 'z')));
        assert_eq!(evaluate("%p1%d", &["x".into()]), Err(ParamError::TypeMismatch(3)));
        assert_eq!(evaluate("%p", &[]), Err(ParamError::UnexpectedEnd));
    }
}
