use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{FolioError, Result};
use crate::parsing::MarkdownRenderer;
use crate::theme::{Props, Renderer};

/// Expands component invocations in content using a theme's shared components.
///
/// Inline form: `{{< name key="value" >}}`. Block form:
/// `{{% name key="value" %}}markdown{{% /name %}}`, where the body is rendered
/// as Markdown and handed to the component as `children`. Fenced code is left alone.
pub struct ComponentProcessor<'a> {
    components: &'a BTreeMap<String, Box<dyn Renderer>>,
    markdown: &'a MarkdownRenderer,
}

impl<'a> ComponentProcessor<'a> {
    pub fn new(
        components: &'a BTreeMap<String, Box<dyn Renderer>>,
        markdown: &'a MarkdownRenderer,
    ) -> Self {
        Self {
            components,
            markdown,
        }
    }

    pub fn process(&self, content: &str) -> Result<String> {
        let mut output = String::with_capacity(content.len());
        let mut remaining = content;

        while !remaining.is_empty() {
            let next_fence = find_next_code_fence(remaining);
            let next_inline = remaining.find("{{<");
            let next_block = remaining.find("{{%");
            let next_component = match (next_inline, next_block) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            if let Some(fence_position) = next_fence
                && next_component.is_none_or(|component| fence_position < component)
            {
                let skip_to = skip_code_fence(remaining, fence_position);
                output.push_str(&remaining[..skip_to]);
                remaining = &remaining[skip_to..];
                continue;
            }

            let Some(start) = next_component else {
                output.push_str(remaining);
                break;
            };

            output.push_str(&remaining[..start]);
            remaining = &remaining[start..];
            remaining = if next_block == Some(start) {
                self.process_block(remaining, &mut output)?
            } else {
                self.process_inline(remaining, &mut output)?
            };
        }

        Ok(output)
    }

    fn lookup(&self, name: &str) -> Result<&dyn Renderer> {
        self.components
            .get(name)
            .map(|component| component.as_ref())
            .ok_or_else(|| FolioError::UnknownComponent {
                name: name.to_string(),
            })
    }

    fn invoke(&self, name: &str, props: &Props, children: &str) -> Result<String> {
        self.lookup(name)?
            .render(props, children)
            .map_err(|error| FolioError::ComponentRender {
                name: name.to_string(),
                message: error.to_string(),
            })
    }

    fn process_inline<'b>(&self, input: &'b str, output: &mut String) -> Result<&'b str> {
        let after_open = &input[3..];

        let close_position =
            after_open
                .find(">}}")
                .ok_or_else(|| FolioError::ComponentParse {
                    message: "unclosed inline component, expected >}}".to_string(),
                })?;

        let inner = after_open[..close_position].trim();
        let (name, props) = parse_component_args(inner)?;

        output.push_str(&self.invoke(&name, &props, "")?);

        Ok(&after_open[close_position + 3..])
    }

    fn process_block<'b>(&self, input: &'b str, output: &mut String) -> Result<&'b str> {
        let after_open = &input[3..];

        let close_position =
            after_open
                .find("%}}")
                .ok_or_else(|| FolioError::ComponentParse {
                    message: "unclosed block component opening tag, expected %}}".to_string(),
                })?;

        let inner = after_open[..close_position].trim();
        let (name, props) = parse_component_args(inner)?;

        let after_opening_tag = &after_open[close_position + 3..];

        let opening_with_args = format!("{{{{% {} ", name);
        let opening_without_args = format!("{{{{% {} %}}}}", name);
        let closing_tag = format!("{{{{% /{} %}}}}", name);
        let closing_position = find_matching_closing_tag(
            after_opening_tag,
            &opening_with_args,
            &opening_without_args,
            &closing_tag,
        )
        .ok_or_else(|| FolioError::ComponentParse {
            message: format!("missing closing tag for block component '{}'", name),
        })?;

        let body_raw = &after_opening_tag[..closing_position];
        let body_processed = self.process(body_raw.trim())?;
        let body_rendered = self.markdown.render(&body_processed);

        output.push_str(&self.invoke(&name, &props, &body_rendered)?);

        Ok(&after_opening_tag[closing_position + closing_tag.len()..])
    }
}

fn parse_component_args(input: &str) -> Result<(String, Props)> {
    let mut arguments = Props::new();
    let mut name = String::new();
    let mut chars = input.chars().peekable();

    skip_whitespace(&mut chars);

    while let Some(&character) = chars.peek() {
        if character.is_alphanumeric() || character == '_' || character == '-' {
            name.push(character);
            chars.next();
        } else {
            break;
        }
    }

    if name.is_empty() {
        return Err(FolioError::ComponentParse {
            message: "component name is empty".to_string(),
        });
    }

    loop {
        skip_whitespace(&mut chars);

        if chars.peek().is_none() {
            break;
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            let value = read_quoted(&mut chars).ok_or_else(|| FolioError::ComponentParse {
                message: format!("unclosed positional string value in component '{}'", name),
            })?;
            arguments.insert("_positional".to_string(), Value::String(value));
            continue;
        }

        let mut key = String::new();
        while let Some(&character) = chars.peek() {
            if character.is_alphanumeric() || character == '_' || character == '-' {
                key.push(character);
                chars.next();
            } else {
                break;
            }
        }

        if key.is_empty() {
            return Err(FolioError::ComponentParse {
                message: format!("expected argument key in component '{}'", name),
            });
        }

        skip_whitespace(&mut chars);

        if chars.next_if_eq(&'=').is_none() {
            return Err(FolioError::ComponentParse {
                message: format!("expected '=' after key '{}' in component '{}'", key, name),
            });
        }

        skip_whitespace(&mut chars);

        if chars.next_if_eq(&'"').is_none() {
            return Err(FolioError::ComponentParse {
                message: format!(
                    "expected '\"' to begin value for key '{}' in component '{}'",
                    key, name
                ),
            });
        }

        let value = read_quoted(&mut chars).ok_or_else(|| FolioError::ComponentParse {
            message: format!(
                "unclosed string value for key '{}' in component '{}'",
                key, name
            ),
        })?;

        arguments.insert(key, Value::String(value));
    }

    Ok((name, arguments))
}

/// Reads up to the closing quote, honoring backslash escapes. `None` if unterminated.
fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<String> {
    let mut value = String::new();
    while let Some(character) = chars.next() {
        match character {
            '\\' => value.push(chars.next()?),
            '"' => return Some(value),
            other => value.push(other),
        }
    }
    None
}

fn find_matching_closing_tag(
    content: &str,
    opening_with_args: &str,
    opening_without_args: &str,
    closing_tag: &str,
) -> Option<usize> {
    let mut depth = 0usize;
    let mut search_from = 0;

    while search_from < content.len() {
        let next_open_with_args = content[search_from..]
            .find(opening_with_args)
            .map(|position| search_from + position);
        let next_open_without_args = content[search_from..]
            .find(opening_without_args)
            .map(|position| search_from + position);
        let next_open = match (next_open_with_args, next_open_without_args) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let next_close = content[search_from..]
            .find(closing_tag)
            .map(|position| search_from + position);

        match (next_open, next_close) {
            (Some(open_position), Some(close_position)) if open_position < close_position => {
                depth += 1;
                let advance = if next_open_with_args == Some(open_position) {
                    opening_with_args.len()
                } else {
                    opening_without_args.len()
                };
                search_from = open_position + advance;
            }
            (_, Some(close_position)) => {
                if depth == 0 {
                    return Some(close_position);
                }
                depth -= 1;
                search_from = close_position + closing_tag.len();
            }
            _ => return None,
        }
    }

    None
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while chars.next_if(|character| character.is_whitespace()).is_some() {}
}

/// Byte offset just past the fenced block starting at `fence_position`.
/// An unterminated fence only skips its own marker.
fn skip_code_fence(content: &str, fence_position: usize) -> usize {
    let fence_marker = if content[fence_position..].starts_with("```") {
        "```"
    } else {
        "~~~"
    };
    let marker_end = fence_position + fence_marker.len();
    let after_fence_start = &content[marker_end..];

    let Some(end_of_opening_line) = after_fence_start.find('\n') else {
        return marker_end;
    };
    let body_start = marker_end + end_of_opening_line + 1;

    match find_closing_code_fence(&content[body_start..], fence_marker) {
        Some(closing_fence) => {
            let end_position = body_start + closing_fence + fence_marker.len();
            content[end_position..]
                .find('\n')
                .map(|newline| end_position + newline + 1)
                .unwrap_or(content.len())
        }
        None => marker_end,
    }
}

fn find_next_code_fence(content: &str) -> Option<usize> {
    let mut search_from = 0;
    while search_from < content.len() {
        let backtick_fence = content[search_from..]
            .find("```")
            .map(|position| search_from + position);
        let tilde_fence = content[search_from..]
            .find("~~~")
            .map(|position| search_from + position);
        let fence_position = match (backtick_fence, tilde_fence) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        if fence_position == 0 || content.as_bytes()[fence_position - 1] == b'\n' {
            return Some(fence_position);
        }
        search_from = fence_position + 3;
    }
    None
}

fn find_closing_code_fence(content: &str, fence_marker: &str) -> Option<usize> {
    let mut search_from = 0;
    while search_from < content.len() {
        let absolute = search_from + content[search_from..].find(fence_marker)?;
        if absolute == 0 || content.as_bytes()[absolute - 1] == b'\n' {
            let after_marker = &content[absolute + fence_marker.len()..];
            let rest_of_line = after_marker.split('\n').next().unwrap_or("");
            if rest_of_line.trim().is_empty() {
                return Some(absolute);
            }
        }
        search_from = absolute + fence_marker.len();
    }
    None
}
