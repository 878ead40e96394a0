//! User defined macros and the bindings a scope can hold.
//!
//! The parser does not expand macros in general. It does need to know their parameter
//! text: a call `\x a.b` of `\def\x#1.{...}` consumes `a.` and the tree should say so.
//! `\expandafter` additionally needs one-step expansion, which [Macro::expand] provides.

use crate::token::{CsName, Token, Value};
use std::rc::Rc;
use texparse_stdext::algorithms::substringsearch::Matcher;

/// What a control sequence or active character means in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A macro created by a definition command.
    Macro(Rc<Macro>),
    /// `\let` to a control sequence: behaves like the named command did at the time.
    Command(CsName),
    /// `\let` to a character token.
    Character(Value),
}

/// A TeX macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    parameter_text: Vec<Token>,
    body: Vec<Token>,
    prefix: Vec<Token>,
    parameters: Vec<Parameter>,
    replacements: Vec<Replacement>,
}

/// A token list or parameter in a replacement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// A list of tokens.
    Tokens(Vec<Token>),
    /// A parameter; the index is always less than the number of parameters.
    Parameter(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Undelimited,
    Delimited(Matcher<Token>),
}

/// A problem found while building a macro from its definition.
///
/// The macro is still built; offending tokens are kept as literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionIssue {
    pub token: Token,
    pub message: String,
}

/// Error matching a call site against a macro's parameter text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The tokens after the macro did not match the prefix of its parameter text.
    PrefixMismatch {
        expected: Token,
        found: Option<Token>,
    },
    /// The input ended while reading an argument. Parameters are numbered from 1.
    EndOfInput { param_num: usize },
}

/// Source of raw tokens for argument matching.
///
/// Implementations return every token, including comments and ignored input; the
/// matching code skips those itself.
pub trait TokenStream {
    fn next_token(&mut self) -> Option<Token>;
    fn peek_token(&mut self) -> Option<Token>;
}

/// The tokens consumed for one argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Argument {
    /// Everything consumed, including leading blanks, braces, comments and delimiters.
    pub consumed: Vec<Token>,
    start: usize,
    end: usize,
}

impl Argument {
    /// The argument value: outer braces and delimiters removed, comments dropped.
    pub fn value(&self) -> impl Iterator<Item = &Token> {
        self.consumed[self.start..self.end]
            .iter()
            .filter(|t| !t.is_ignorable())
    }
}

/// Result of matching a call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Call {
    /// Tokens consumed while matching the prefix.
    pub prefix: Vec<Token>,
    pub arguments: Vec<Argument>,
}

impl Call {
    pub fn consumed(&self) -> impl Iterator<Item = &Token> {
        self.prefix
            .iter()
            .chain(self.arguments.iter().flat_map(|a| a.consumed.iter()))
    }
}

pub fn char_to_parameter_index(c: char) -> Option<usize> {
    match c {
        '1'..='9' => c.to_digit(10).map(|d| d as usize - 1),
        _ => None,
    }
}

impl Macro {
    /// Build a macro from its parameter text and body.
    ///
    /// Both lists must already exclude comments and ignored input, and the body must
    /// exclude its outer braces.
    pub fn new(parameter_text: Vec<Token>, body: Vec<Token>) -> (Macro, Vec<DefinitionIssue>) {
        let mut issues = Vec::new();
        let (prefix, parameters) = parse_prefix_and_parameters(&parameter_text, &mut issues);
        let replacements = parse_replacement_text(&body, parameters.len(), &mut issues);
        (
            Macro {
                parameter_text,
                body,
                prefix,
                parameters,
                replacements,
            },
            issues,
        )
    }

    /// A macro with `n` undelimited parameters, as created by `\newcommand`.
    pub fn with_undelimited_parameters(
        n: usize,
        body: Vec<Token>,
    ) -> (Macro, Vec<DefinitionIssue>) {
        let mut issues = Vec::new();
        let replacements = parse_replacement_text(&body, n, &mut issues);
        (
            Macro {
                parameter_text: vec![],
                body,
                prefix: vec![],
                parameters: vec![Parameter::Undelimited; n],
                replacements,
            },
            issues,
        )
    }

    pub fn parameter_text(&self) -> &[Token] {
        &self.parameter_text
    }

    pub fn body(&self) -> &[Token] {
        &self.body
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    /// Match the tokens following a call of this macro.
    pub fn match_call<S: TokenStream>(&self, stream: &mut S) -> Result<Call, (Call, CallError)> {
        let mut call = Call::default();
        for expected in &self.prefix {
            let found = next_significant(stream, &mut call.prefix);
            if found != Some(*expected) {
                return Err((
                    call,
                    CallError::PrefixMismatch {
                        expected: *expected,
                        found,
                    },
                ));
            }
        }
        for (i, parameter) in self.parameters.iter().enumerate() {
            let mut argument = Argument::default();
            let result = match parameter {
                Parameter::Undelimited => parse_undelimited_argument(stream, i + 1, &mut argument),
                Parameter::Delimited(matcher) => {
                    parse_delimited_argument(stream, matcher, i + 1, &mut argument)
                }
            };
            call.arguments.push(argument);
            if let Err(err) = result {
                return Err((call, err));
            }
        }
        Ok(call)
    }

    /// One-step expansion: the replacement text with arguments substituted.
    ///
    /// Every returned token is synthetic.
    pub fn expand(&self, call: &Call) -> Vec<Token> {
        let mut result = Vec::new();
        for replacement in &self.replacements {
            match replacement {
                Replacement::Tokens(tokens) => {
                    result.extend(tokens.iter().map(|t| t.into_synthetic()))
                }
                Replacement::Parameter(i) => {
                    if let Some(argument) = call.arguments.get(*i) {
                        result.extend(argument.value().map(|t| t.into_synthetic()))
                    }
                }
            }
        }
        result
    }
}

fn next_significant<S: TokenStream>(stream: &mut S, consumed: &mut Vec<Token>) -> Option<Token> {
    while let Some(token) = stream.next_token() {
        consumed.push(token);
        if !token.is_ignorable() {
            return Some(token);
        }
    }
    None
}

fn parse_undelimited_argument<S: TokenStream>(
    stream: &mut S,
    param_num: usize,
    argument: &mut Argument,
) -> Result<(), CallError> {
    let first = loop {
        match next_significant(stream, &mut argument.consumed) {
            None => return Err(CallError::EndOfInput { param_num }),
            Some(token) if token.is_space() || token.value() == Value::Par => continue,
            Some(token) => break token,
        }
    };
    argument.start = argument.consumed.len() - 1;
    if !matches!(first.value(), Value::BeginGroup(_)) {
        argument.end = argument.consumed.len();
        return Ok(());
    }
    argument.start += 1;
    let mut depth = 1_usize;
    while let Some(token) = next_significant(stream, &mut argument.consumed) {
        match token.value() {
            Value::BeginGroup(_) => depth += 1,
            Value::EndGroup(_) => {
                depth -= 1;
                if depth == 0 {
                    argument.end = argument.consumed.len() - 1;
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    argument.end = argument.consumed.len();
    Err(CallError::EndOfInput { param_num })
}

fn parse_delimited_argument<S: TokenStream>(
    stream: &mut S,
    matcher: &Matcher<Token>,
    param_num: usize,
    argument: &mut Argument,
) -> Result<(), CallError> {
    let mut search = matcher.start();
    let mut depth = 0_usize;
    // Indices into `consumed` of the significant tokens, so the delimiter can be cut off.
    let mut significant: Vec<usize> = Vec::new();
    while let Some(token) = next_significant(stream, &mut argument.consumed) {
        significant.push(argument.consumed.len() - 1);
        match token.value() {
            Value::BeginGroup(_) => depth += 1,
            Value::EndGroup(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
        if search.next(&token) && depth == 0 {
            let value_len = significant.len() - matcher.substring().len();
            let value = &significant[..value_len];
            let (start, end) = match (value.first(), value.last()) {
                (Some(first), Some(last)) => (*first, *last + 1),
                _ => (0, 0),
            };
            argument.start = start;
            argument.end = end;
            let only_group = value_len >= 2
                && matches!(argument.consumed[start].value(), Value::BeginGroup(_))
                && matches!(argument.consumed[end - 1].value(), Value::EndGroup(_))
                && braces_enclose(&argument.consumed[start..end]);
            if only_group {
                argument.start += 1;
                argument.end -= 1;
            }
            return Ok(());
        }
    }
    argument.start = 0;
    argument.end = argument.consumed.len();
    Err(CallError::EndOfInput { param_num })
}

/// Whether the first brace of the list closes at the last token.
fn braces_enclose(tokens: &[Token]) -> bool {
    let mut depth = 0_usize;
    let significant: Vec<&Token> = tokens.iter().filter(|t| !t.is_ignorable()).collect();
    for (i, token) in significant.iter().enumerate() {
        match token.value() {
            Value::BeginGroup(_) => depth += 1,
            Value::EndGroup(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i + 1 != significant.len() {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn parse_prefix_and_parameters(
    parameter_text: &[Token],
    issues: &mut Vec<DefinitionIssue>,
) -> (Vec<Token>, Vec<Parameter>) {
    let mut prefix = Vec::new();
    // Each parameter with the delimiter tokens that follow it.
    let mut raw: Vec<Vec<Token>> = Vec::new();
    let mut iter = parameter_text.iter().peekable();
    while let Some(token) = iter.next() {
        if let Value::Parameter(_) = token.value() {
            let index = iter
                .peek()
                .and_then(|next| next.char().filter(|_| next.cs_name().is_none()))
                .and_then(char_to_parameter_index);
            match index {
                Some(index) if index == raw.len() => {
                    iter.next();
                    raw.push(Vec::new());
                    continue;
                }
                Some(index) => {
                    issues.push(DefinitionIssue {
                        token: *token,
                        message: format!(
                            "unexpected parameter number {}; this macro has {} parameter(s) so far, so #{} was expected",
                            index + 1,
                            raw.len(),
                            raw.len() + 1
                        ),
                    });
                    iter.next();
                    continue;
                }
                None => {
                    issues.push(DefinitionIssue {
                        token: *token,
                        message: "a parameter token in a parameter text must be followed by a digit 1-9".into(),
                    });
                }
            }
        }
        match raw.last_mut() {
            None => prefix.push(*token),
            Some(delimiter) => delimiter.push(*token),
        }
    }
    let parameters = raw
        .into_iter()
        .map(|delimiter| match Matcher::new(delimiter) {
            None => Parameter::Undelimited,
            Some(matcher) => Parameter::Delimited(matcher),
        })
        .collect();
    (prefix, parameters)
}

fn parse_replacement_text(
    body: &[Token],
    num_parameters: usize,
    issues: &mut Vec<DefinitionIssue>,
) -> Vec<Replacement> {
    let mut result: Vec<Replacement> = Vec::new();
    let push_token = |result: &mut Vec<Replacement>, token: Token| match result.last_mut() {
        Some(Replacement::Tokens(tokens)) => tokens.push(token),
        _ => result.push(Replacement::Tokens(vec![token])),
    };
    let mut iter = body.iter().peekable();
    while let Some(token) = iter.next() {
        if !matches!(token.value(), Value::Parameter(_)) {
            push_token(&mut result, *token);
            continue;
        }
        let Some(next) = iter.peek().copied() else {
            issues.push(DefinitionIssue {
                token: *token,
                message: "a replacement text cannot end with a parameter token".into(),
            });
            push_token(&mut result, *token);
            continue;
        };
        if let Value::Parameter(_) = next.value() {
            iter.next();
            push_token(&mut result, *next);
            continue;
        }
        match next
            .char()
            .filter(|_| next.cs_name().is_none())
            .and_then(char_to_parameter_index)
        {
            Some(index) if index < num_parameters => {
                iter.next();
                result.push(Replacement::Parameter(index));
            }
            _ => {
                issues.push(DefinitionIssue {
                    token: *token,
                    message: format!(
                        "a parameter token in a replacement text must be followed by `#` or a parameter number between 1 and {num_parameters}"
                    ),
                });
                push_token(&mut result, *token);
            }
        }
    }
    result
}
