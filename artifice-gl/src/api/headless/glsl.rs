//! GLSL declaration scanner.
//!
//! Finds `struct` definitions and default-block `uniform` declarations in a shader source, and
//! expands them into the list of uniforms a linker would report (`light.color`,
//! `lights[1].color`, `weights[0]`). Everything else in the source is skipped; the only checks
//! are balanced braces, known types, literal array sizes and the presence of `main`.
use crate::uniform::UniformType;
use std::collections::HashMap;

/// A uniform as reported after link.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DeclaredUniform {
    pub(crate) name: String,
    pub(crate) ty: UniformType,
    pub(crate) size: u32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Token<'a> {
    Ident(&'a str),
    Number(&'a str),
    Punct(char),
}

#[derive(Copy, Clone, Debug)]
enum DeclType<'a> {
    Basic(UniformType),
    Struct(&'a str),
}

#[derive(Copy, Clone, Debug)]
struct Field<'a> {
    ty: DeclType<'a>,
    name: &'a str,
    array: Option<u32>,
}

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    // keep line structure for directives
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn tokenize<'a>(line: &'a str, out: &mut Vec<Token<'a>>) {
    let mut chars = line.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            let numeric = c.is_ascii_digit();
            let mut end = start + c.len_utf8();
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' || (numeric && c == '.') {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &line[start..end];
            if numeric {
                out.push(Token::Number(word));
            } else {
                out.push(Token::Ident(word));
            }
        } else {
            out.push(Token::Punct(c));
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    structs: HashMap<&'a str, Vec<Field<'a>>>,
    uniforms: Vec<DeclaredUniform>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<Token<'a>> {
        self.tokens.get(self.pos + offset).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, punct: char) -> Result<(), String> {
        match self.next() {
            Some(Token::Punct(c)) if c == punct => Ok(()),
            other => Err(format!("expected `{}`, found {:?}", punct, other)),
        }
    }

    fn ident(&mut self) -> Result<&'a str, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(format!("expected identifier, found {:?}", other)),
        }
    }

    fn skip_precision(&mut self) {
        while let Some(Token::Ident(q)) = self.peek() {
            if PRECISION_QUALIFIERS.contains(&q) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Skips a parenthesized group (`layout(...)`).
    fn skip_parens(&mut self) -> Result<(), String> {
        self.expect('(')?;
        let mut depth = 1;
        while depth > 0 {
            match self.next() {
                Some(Token::Punct('(')) => depth += 1,
                Some(Token::Punct(')')) => depth -= 1,
                Some(_) => {}
                None => return Err("unterminated `(`".to_string()),
            }
        }
        Ok(())
    }

    /// Skips a brace-delimited body, the opening brace included, then everything up to `;`.
    fn skip_block(&mut self) -> Result<(), String> {
        self.expect('{')?;
        let mut depth = 1;
        while depth > 0 {
            match self.next() {
                Some(Token::Punct('{')) => depth += 1,
                Some(Token::Punct('}')) => depth -= 1,
                Some(_) => {}
                None => return Err("unterminated `{`".to_string()),
            }
        }
        self.skip_statement()
    }

    fn skip_statement(&mut self) -> Result<(), String> {
        loop {
            match self.next() {
                Some(Token::Punct(';')) => return Ok(()),
                Some(_) => {}
                None => return Err("expected `;`".to_string()),
            }
        }
    }

    fn parse_type(&mut self) -> Result<DeclType<'a>, String> {
        self.skip_precision();
        let name = self.ident()?;
        if let Some(ty) = UniformType::from_glsl(name) {
            Ok(DeclType::Basic(ty))
        } else if self.structs.contains_key(name) {
            Ok(DeclType::Struct(name))
        } else {
            Err(format!("unknown type `{}`", name))
        }
    }

    fn array_suffix(&mut self) -> Result<Option<u32>, String> {
        if self.peek() != Some(Token::Punct('[')) {
            return Ok(None);
        }
        self.pos += 1;
        let size = match self.next() {
            Some(Token::Number(n)) => n
                .trim_end_matches(|c: char| c == 'u' || c == 'U')
                .parse::<u32>()
                .map_err(|_| format!("invalid array size `{}`", n))?,
            other => return Err(format!("array size must be a literal, found {:?}", other)),
        };
        if size == 0 {
            return Err("array size must be positive".to_string());
        }
        self.expect(']')?;
        Ok(Some(size))
    }

    /// `name[N], name2, ... ;`
    fn declarators(&mut self) -> Result<Vec<(&'a str, Option<u32>)>, String> {
        let mut names = Vec::new();
        loop {
            let name = self.ident()?;
            let array = self.array_suffix()?;
            names.push((name, array));
            match self.next() {
                Some(Token::Punct(',')) => continue,
                Some(Token::Punct(';')) => return Ok(names),
                other => return Err(format!("expected `,` or `;`, found {:?}", other)),
            }
        }
    }

    fn struct_definition(&mut self) -> Result<(), String> {
        let name = self.ident()?;
        self.expect('{')?;
        let mut fields = Vec::new();
        while self.peek() != Some(Token::Punct('}')) {
            let ty = self.parse_type()?;
            for (field, array) in self.declarators()? {
                fields.push(Field {
                    ty,
                    name: field,
                    array,
                });
            }
        }
        self.pos += 1;
        self.structs.insert(name, fields);
        // `struct S { ... } s;` declares a global, which is not a uniform
        self.skip_statement()
    }

    fn uniform_declaration(&mut self) -> Result<(), String> {
        if let (Some(Token::Ident(_)), Some(Token::Punct('{'))) = (self.peek(), self.peek_at(1)) {
            // uniform block: members have no location
            self.pos += 1;
            return self.skip_block();
        }
        let ty = self.parse_type()?;
        for (name, array) in self.declarators()? {
            flatten(&self.structs, name.to_string(), ty, array, &mut self.uniforms);
        }
        Ok(())
    }

    fn run(mut self) -> Result<Vec<DeclaredUniform>, String> {
        let mut depth = 0u32;
        let mut has_main = false;
        while let Some(token) = self.next() {
            match token {
                Token::Punct('{') => depth += 1,
                Token::Punct('}') => {
                    if depth == 0 {
                        return Err("unbalanced `}`".to_string());
                    }
                    depth -= 1;
                }
                Token::Ident("struct") if depth == 0 => self.struct_definition()?,
                Token::Ident("uniform") if depth == 0 => self.uniform_declaration()?,
                Token::Ident("layout") if depth == 0 => self.skip_parens()?,
                Token::Ident("void") if depth == 0 => {
                    if self.peek() == Some(Token::Ident("main"))
                        && self.peek_at(1) == Some(Token::Punct('('))
                    {
                        has_main = true;
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err("unexpected end of source".to_string());
        }
        if !has_main {
            return Err("missing entry point `void main()`".to_string());
        }
        Ok(self.uniforms)
    }
}

fn flatten(
    structs: &HashMap<&str, Vec<Field<'_>>>,
    name: String,
    ty: DeclType<'_>,
    array: Option<u32>,
    out: &mut Vec<DeclaredUniform>,
) {
    match ty {
        DeclType::Basic(ty) => out.push(match array {
            None => DeclaredUniform { name, ty, size: 1 },
            Some(size) => DeclaredUniform {
                name: format!("{}[0]", name),
                ty,
                size,
            },
        }),
        DeclType::Struct(s) => {
            let fields = match structs.get(s) {
                Some(fields) => fields,
                None => return,
            };
            match array {
                None => {
                    for f in fields.iter() {
                        flatten(structs, format!("{}.{}", name, f.name), f.ty, f.array, out);
                    }
                }
                Some(size) => {
                    for i in 0..size {
                        for f in fields.iter() {
                            flatten(structs, format!("{}[{}].{}", name, i, f.name), f.ty, f.array, out);
                        }
                    }
                }
            }
        }
    }
}

/// Scans a shader source. Returns the declared uniforms, or the compile log on failure.
pub(crate) fn scan(source: &str) -> Result<Vec<DeclaredUniform>, String> {
    let source = strip_comments(source);
    let mut tokens = Vec::new();
    for (line_number, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(directive) = trimmed.strip_prefix('#') {
            if let Some(message) = directive.trim_start().strip_prefix("error") {
                return Err(format!("0:{}: error: #error{}", line_number + 1, message));
            }
            continue;
        }
        tokenize(line, &mut tokens);
    }
    Parser {
        tokens,
        pos: 0,
        structs: HashMap::new(),
        uniforms: Vec::new(),
    }
    .run()
    .map_err(|message| format!("0:0: error: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(uniforms: &[DeclaredUniform]) -> Vec<(&str, u32)> {
        uniforms.iter().map(|u| (u.name.as_str(), u.size)).collect()
    }

    #[test]
    fn plain_and_array_uniforms() {
        let uniforms = scan(
            r"
            #version 450
            uniform mat4 mvp;
            uniform highp vec3 a, b[2];
            layout(location = 4) uniform float weights[4];
            void main() { gl_Position = mvp * vec4(0.0); }
            ",
        )
        .unwrap();
        assert_eq!(names(&uniforms), vec![("mvp", 1), ("a", 1), ("b[0]", 2), ("weights[0]", 4)]);
        assert_eq!(uniforms[0].ty, UniformType::MAT4);
        assert_eq!(uniforms[3].ty, UniformType::FLOAT);
    }

    #[test]
    fn struct_uniforms_are_expanded() {
        let uniforms = scan(
            r"
            struct Light {
                vec3 color;
                float intensity[2];
            };
            uniform Light sun;
            uniform Light lights[2];
            void main() {}
            ",
        )
        .unwrap();
        assert_eq!(
            names(&uniforms),
            vec![
                ("sun.color", 1),
                ("sun.intensity[0]", 2),
                ("lights[0].color", 1),
                ("lights[0].intensity[0]", 2),
                ("lights[1].color", 1),
                ("lights[1].intensity[0]", 2),
            ]
        );
    }

    #[test]
    fn blocks_and_comments_are_skipped() {
        let uniforms = scan(
            r"
            // uniform float commented;
            /* uniform float
               also_commented; */
            layout(std140, binding = 0) uniform Camera {
                mat4 view;
            } camera;
            uniform sampler2D tex;
            void main() { float uniform_like = 1.0; }
            ",
        )
        .unwrap();
        assert_eq!(names(&uniforms), vec![("tex", 1)]);
    }

    #[test]
    fn compile_errors() {
        assert!(scan("uniform float x;").unwrap_err().contains("main"));
        assert!(scan("uniform Unknown x; void main() {}")
            .unwrap_err()
            .contains("unknown type `Unknown`"));
        assert!(scan("#error not supported\nvoid main() {}")
            .unwrap_err()
            .contains("#error not supported"));
        assert!(scan("void main() {").is_err());
        assert!(scan("uniform float w[N]; void main() {}").is_err());
    }
}
