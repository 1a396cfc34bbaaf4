use super::resolver::{resolve, VariableMap};
use super::{Element, Template};
use crate::brand::BrandStyle;
use crate::error::{Result, VideoError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 按类型加载模板：先找 `{type}.json`，再扫描目录中 `templateType` 匹配的文件
pub async fn load_template(templates_dir: &Path, template_type: &str) -> Result<Template> {
    if template_type.is_empty()
        || template_type.contains(['/', '\\'])
        || template_type.contains("..")
    {
        return Err(VideoError::InvalidInputError(format!(
            "invalid template type: '{}'",
            template_type
        )));
    }

    let path = match find_template_file(templates_dir, template_type).await? {
        Some(path) => path,
        None => {
            return Err(VideoError::TemplateNotFoundError(format!(
                "no template of type '{}' in {}",
                template_type,
                templates_dir.display()
            )))
        }
    };

    info!("Loading template '{}' from {}", template_type, path.display());
    let raw = tokio::fs::read_to_string(&path).await?;
    let mut template = parse_template(&raw, template_type)?;
    if template.template_type.is_empty() {
        template.template_type = template_type.to_string();
    }

    info!(
        "Template '{}' has {} sections ({:.1}s total)",
        template.template_name,
        template.sections.len(),
        template.total_duration()
    );
    Ok(template)
}

async fn find_template_file(templates_dir: &Path, template_type: &str) -> Result<Option<PathBuf>> {
    let direct = templates_dir.join(format!("{}.json", template_type));
    if tokio::fs::metadata(&direct).await.is_ok() {
        return Ok(Some(direct));
    }

    let mut entries = match tokio::fs::read_dir(templates_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Ok(raw) = tokio::fs::read_to_string(&path).await else {
            continue;
        };
        let Ok(doc) = serde_json::from_str::<Value>(&raw) else {
            debug!("Skipping unparsable template candidate {}", path.display());
            continue;
        };
        if doc["templateType"].as_str() == Some(template_type) {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// 解析并校验模板 JSON；`id` 仅用于错误信息
pub fn parse_template(raw: &str, id: &str) -> Result<Template> {
    let doc: Value = serde_json::from_str(raw).map_err(|e| VideoError::malformed(id, e.to_string()))?;

    let Some(obj) = doc.as_object() else {
        return Err(VideoError::malformed(id, "document is not an object"));
    };
    if !obj.contains_key("templateName") && !obj.contains_key("name") {
        return Err(VideoError::malformed(id, "missing templateName"));
    }
    match obj.get("sections") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(VideoError::malformed(id, "sections is not an array")),
        None => return Err(VideoError::malformed(id, "missing sections")),
    }
    if !obj.contains_key("scriptTemplate") {
        return Err(VideoError::malformed(id, "missing scriptTemplate"));
    }

    let template: Template =
        serde_json::from_value(doc).map_err(|e| VideoError::malformed(id, e.to_string()))?;

    for (index, section) in template.sections.iter().enumerate() {
        if let Some(duration) = section.duration {
            if !(duration > 0.0 && duration.is_finite()) {
                return Err(VideoError::malformed(
                    id,
                    format!("section {} has non-positive duration {}", index, duration),
                ));
            }
        }
    }

    Ok(template)
}

/// 生成填充了变量的新模板，原模板保持不变
pub fn fill_template(template: &Template, brand: &BrandStyle, vars: &VariableMap) -> Result<Template> {
    if template.template_name.trim().is_empty() {
        return Err(VideoError::InvalidInputError("template has no name".to_string()));
    }
    if brand.primary_color.trim().is_empty() {
        return Err(VideoError::InvalidInputError("brand style has no primary color".to_string()));
    }
    if vars.is_empty() {
        return Err(VideoError::InvalidInputError(format!(
            "no variables supplied for template '{}'",
            template.template_name
        )));
    }

    let mut merged = brand.variables();
    merged.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut filled = template.clone();
    filled.script_template = resolve(&filled.script_template, &merged);

    for section in &mut filled.sections {
        if let Some(overlay) = &mut section.overlay {
            overlay.text = resolve(&overlay.text, &merged);
            overlay.subtext = resolve(&overlay.subtext, &merged);
        }
        for element in &mut section.elements {
            match element {
                Element::Text(text) => text.content = resolve(&text.content, &merged),
                Element::LowerThird(lower) => {
                    lower.content = resolve(&lower.content, &merged);
                    lower.subtext = resolve(&lower.subtext, &merged);
                }
                Element::Image(image) => {
                    if let Some(prompt) = &image.prompt {
                        image.prompt = Some(resolve(prompt, &merged));
                    }
                }
                Element::Background(_)
                | Element::Logo(_)
                | Element::ImageSequence(_)
                | Element::Unknown => {}
            }
        }
    }

    Ok(filled)
}
