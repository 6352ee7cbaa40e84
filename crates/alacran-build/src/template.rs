/// Built-in Dockerfile templates addressed by `templateId`.
///
/// A template id has the form `<language>/<version>`, e.g. `node/20`; the
/// version is substituted for `{version}` in the template body.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<(String, String)>,
}

const NODE: &str = r#"FROM node:{version}-alpine
RUN mkdir -p /usr/src/app
WORKDIR /usr/src/app
COPY ./ /usr/src/app
RUN npm install --omit=dev && npm cache clean --force
ENV NODE_ENV=production
ENV PORT=80
EXPOSE 80
CMD ["npm", "start"]"#;

const PYTHON: &str = r#"FROM python:{version}-slim
RUN mkdir -p /usr/src/app
WORKDIR /usr/src/app
COPY ./ /usr/src/app
RUN pip install --no-cache-dir -r requirements.txt
ENV PORT=80
EXPOSE 80
CMD ["python", "app.py"]"#;

const RUBY: &str = r#"FROM ruby:{version}-slim
RUN mkdir -p /usr/src/app
WORKDIR /usr/src/app
COPY ./ /usr/src/app
RUN bundle config set --local without 'development test' && bundle install
ENV PORT=80
EXPOSE 80
CMD ["bundle", "exec", "rackup", "--host", "0.0.0.0", "-p", "80"]"#;

const PHP: &str = r#"FROM php:{version}-apache
COPY ./ /var/www/html/
RUN chown -R www-data:www-data /var/www/html
EXPOSE 80"#;

const GO: &str = r#"FROM golang:{version}-alpine AS builder
WORKDIR /src
COPY ./ /src
RUN CGO_ENABLED=0 go build -o /app .

FROM alpine:3
COPY --from=builder /app /usr/local/bin/app
ENV PORT=80
EXPOSE 80
CMD ["app"]"#;

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    pub fn builtin() -> Self {
        let templates = [
            ("node", NODE),
            ("python", PYTHON),
            ("ruby", RUBY),
            ("php", PHP),
            ("go", GO),
        ]
        .into_iter()
        .map(|(lang, body)| (lang.to_owned(), body.to_owned()))
        .collect();
        Self { templates }
    }

    /// Languages with a template, in catalog order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|(lang, _)| lang.as_str())
    }

    /// Resolves `template_id` to a Dockerfile body.
    pub fn dockerfile_for(&self, template_id: &str) -> Result<String, TemplateError> {
        let (language, version) =
            template_id
                .split_once('/')
                .ok_or_else(|| TemplateError::Malformed {
                    template_id: template_id.to_owned(),
                })?;

        if version.is_empty()
            || !version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(TemplateError::InvalidVersion {
                version: version.to_owned(),
            });
        }

        let (_, body) = self
            .templates
            .iter()
            .find(|(lang, _)| lang == language)
            .ok_or_else(|| TemplateError::UnknownLanguage {
                language: language.to_owned(),
            })?;

        Ok(body.replace("{version}", version))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("templateId '{template_id}' must look like <language>/<version>")]
    Malformed { template_id: String },

    #[error("no template for language '{language}'")]
    UnknownLanguage { language: String },

    #[error("invalid template version '{version}'")]
    InvalidVersion { version: String },
}
