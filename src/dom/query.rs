//! Selector engines used to re-find elements from a locator.
//!
//! Both engines cover exactly the subset the locator generator emits:
//! absolute XPath made of `tag` / `tag[n]` steps, and CSS compounds of
//! type, `#id`, `.class`, `[attr]`, `[attr="v"]` and `:nth-of-type(n)`
//! joined by descendant or `>` combinators.

use crate::dom::DomError;
use crate::dom::document::Dom;
use crate::dom::node::NodeId;

// ============================================================================
// XPath
// ============================================================================

/// Evaluate an absolute XPath against `root` (a document or shadow root).
pub fn evaluate_xpath(dom: &Dom, root: NodeId, xpath: &str) -> Option<NodeId> {
    let path = xpath.trim();
    if !path.starts_with('/') || path.starts_with("//") {
        return None;
    }

    let mut current = root;
    for segment in path.split('/').skip(1) {
        let (tag, index) = parse_xpath_step(segment)?;
        let matches: Vec<NodeId> = dom
            .element_children(current)
            .into_iter()
            .filter(|c| dom.tag(*c).is_some_and(|t| tag == "*" || t == tag))
            .collect();
        current = *matches.get(index.checked_sub(1)?)?;
    }

    (current != root).then_some(current)
}

fn parse_xpath_step(segment: &str) -> Option<(String, usize)> {
    if segment.is_empty() {
        return None;
    }
    match segment.find('[') {
        Some(open) => {
            let close = segment.rfind(']')?;
            let index = segment.get(open + 1..close)?.trim().parse().ok()?;
            Some((segment[..open].to_ascii_lowercase(), index))
        }
        None => Some((segment.to_ascii_lowercase(), 1)),
    }
}

// ============================================================================
// CSS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum SimpleSelector {
    Tag(String),
    Universal,
    Id(String),
    Class(String),
    AttrExists(String),
    AttrEquals(String, String),
    NthOfType(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CssSelector {
    /// Compounds left to right; `combinators[i]` joins compound `i` and `i + 1`.
    compounds: Vec<Vec<SimpleSelector>>,
    combinators: Vec<Combinator>,
}

impl CssSelector {
    pub fn parse(input: &str) -> Result<CssSelector, DomError> {
        let invalid = || DomError::InvalidSelector(input.to_string());
        let chars: Vec<char> = input.trim().chars().collect();
        if chars.is_empty() {
            return Err(invalid());
        }

        let mut compounds = vec![];
        let mut combinators = vec![];
        let mut current: Vec<SimpleSelector> = vec![];
        let mut pending: Option<Combinator> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' | '>' => {
                    if !current.is_empty() {
                        compounds.push(std::mem::take(&mut current));
                    }
                    if c == '>' {
                        pending = Some(Combinator::Child);
                    } else if pending.is_none() {
                        pending = Some(Combinator::Descendant);
                    }
                    i += 1;
                    continue;
                }
                _ => {}
            }

            if let Some(comb) = pending.take() {
                if compounds.is_empty() {
                    return Err(invalid());
                }
                combinators.push(comb);
            }

            match c {
                '#' => {
                    let (name, next) = read_ident(&chars, i + 1);
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    current.push(SimpleSelector::Id(name));
                    i = next;
                }
                '.' => {
                    let (name, next) = read_ident(&chars, i + 1);
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    current.push(SimpleSelector::Class(name));
                    i = next;
                }
                '[' => {
                    let (simple, next) = read_attribute(&chars, i + 1).ok_or_else(invalid)?;
                    current.push(simple);
                    i = next;
                }
                ':' => {
                    let (name, next) = read_ident(&chars, i + 1);
                    if name != "nth-of-type" || chars.get(next) != Some(&'(') {
                        return Err(invalid());
                    }
                    let close = chars[next..]
                        .iter()
                        .position(|c| *c == ')')
                        .map(|p| p + next)
                        .ok_or_else(invalid)?;
                    let n: String = chars[next + 1..close].iter().collect();
                    let n = n.trim().parse().map_err(|_| invalid())?;
                    current.push(SimpleSelector::NthOfType(n));
                    i = close + 1;
                }
                '*' => {
                    current.push(SimpleSelector::Universal);
                    i += 1;
                }
                _ => {
                    let (name, next) = read_ident(&chars, i);
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    current.push(SimpleSelector::Tag(name.to_ascii_lowercase()));
                    i = next;
                }
            }
        }

        if pending.is_some() && current.is_empty() {
            return Err(invalid());
        }
        if !current.is_empty() {
            compounds.push(current);
        }

        Ok(CssSelector {
            compounds,
            combinators,
        })
    }

    pub fn matches(&self, dom: &Dom, element: NodeId, scope: NodeId) -> bool {
        let Some(last) = self.compounds.len().checked_sub(1) else {
            return false;
        };
        self.matches_from(dom, element, scope, last)
    }

    fn matches_from(&self, dom: &Dom, element: NodeId, scope: NodeId, idx: usize) -> bool {
        if !matches_compound(dom, element, &self.compounds[idx]) {
            return false;
        }
        if idx == 0 {
            return true;
        }

        match self.combinators[idx - 1] {
            Combinator::Child => match dom.parent_element(element) {
                Some(parent) if parent != scope => self.matches_from(dom, parent, scope, idx - 1),
                _ => false,
            },
            Combinator::Descendant => {
                let mut ancestor = dom.parent_element(element);
                while let Some(a) = ancestor {
                    if a == scope {
                        return false;
                    }
                    if self.matches_from(dom, a, scope, idx - 1) {
                        return true;
                    }
                    ancestor = dom.parent_element(a);
                }
                false
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == '\\'
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut out = String::new();
    let mut i = start;
    while i < chars.len() && is_ident_char(chars[i]) {
        if chars[i] == '\\' {
            if let Some(next) = chars.get(i + 1) {
                out.push(*next);
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    (out, i)
}

fn read_attribute(chars: &[char], start: usize) -> Option<(SimpleSelector, usize)> {
    let (name, mut i) = read_ident(chars, start);
    if name.is_empty() {
        return None;
    }
    match chars.get(i)? {
        ']' => Some((SimpleSelector::AttrExists(name.to_ascii_lowercase()), i + 1)),
        '=' => {
            i += 1;
            let quote = *chars.get(i)?;
            let mut value = String::new();
            if quote == '"' || quote == '\'' {
                i += 1;
                while *chars.get(i)? != quote {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    value.push(*chars.get(i)?);
                    i += 1;
                }
                i += 1;
            } else {
                let (raw, next) = read_ident(chars, i);
                value = raw;
                i = next;
            }
            if *chars.get(i)? != ']' {
                return None;
            }
            Some((
                SimpleSelector::AttrEquals(name.to_ascii_lowercase(), value),
                i + 1,
            ))
        }
        _ => None,
    }
}

fn matches_compound(dom: &Dom, element: NodeId, compound: &[SimpleSelector]) -> bool {
    let Some(el) = dom.element(element) else {
        return false;
    };
    compound.iter().all(|simple| match simple {
        SimpleSelector::Universal => true,
        SimpleSelector::Tag(tag) => el.tag == *tag,
        SimpleSelector::Id(id) => el.id() == Some(id.as_str()),
        SimpleSelector::Class(class) => el.has_class(class),
        SimpleSelector::AttrExists(name) => el.has_attr(name),
        SimpleSelector::AttrEquals(name, value) => el.attr(name) == Some(value.as_str()),
        SimpleSelector::NthOfType(n) => nth_of_type(dom, element) == *n,
    })
}

/// 1-based position of `element` among element siblings sharing its tag.
pub fn nth_of_type(dom: &Dom, element: NodeId) -> usize {
    let Some(tag) = dom.tag(element) else {
        return 0;
    };
    let Some(parent) = dom.parent(element) else {
        return 1;
    };
    dom.element_children(parent)
        .into_iter()
        .filter(|c| dom.tag(*c) == Some(tag))
        .position(|c| c == element)
        .map(|p| p + 1)
        .unwrap_or(0)
}

pub fn query_selector_all(dom: &Dom, root: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
    let parsed = CssSelector::parse(selector)?;
    Ok(dom
        .descendants(root)
        .into_iter()
        .filter(|el| parsed.matches(dom, *el, root))
        .collect())
}

pub fn query_selector(dom: &Dom, root: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
    Ok(query_selector_all(dom, root, selector)?.into_iter().next())
}
