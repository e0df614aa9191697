use crate::artifact::Artifact;
use crate::rule::Rule;
use crate::pattern::PatternRule;

/*  C5: per-build-file scope. A child registry shares nothing with its
    parent except the path used to anchor its own cwd -- spec.md §4.5's
    "inherits nothing by default" is the whole reason this carries a
    parent *reference* rather than a parent rule list. */
#[derive(Clone)]
pub struct Context
{
    pub cwd: String,
    pub rules: Vec<Rule>,
    pub patterns: Vec<PatternRule>,
    pub requested: Vec<Artifact>,
    parent_cwd: Option<String>,
}

impl Context
{
    pub fn new(cwd: &str) -> Context
    {
        Context
        {
            cwd: cwd.to_string(),
            rules: Vec::new(),
            patterns: Vec::new(),
            requested: Vec::new(),
            parent_cwd: None,
        }
    }

    /*  §4.3/§4.6: a later Rule sharing a target with an earlier one
        shadows it outright (AmbiguousRule, non-fatal). Dropping the
        shadowed Rule at registration time, rather than searching for
        "first match" among duplicates later, is what keeps "search in
        registration order, first match wins" and "last registration
        wins" consistent with each other. Returns the labels of any
        targets that were shadowed, for the caller to warn about. */
    pub fn register_rule(&mut self, rule: Rule) -> Vec<String>
    {
        let incoming_keys: Vec<_> = rule.targets.iter().map(|t| t.resolution_key()).collect();

        let mut shadowed = Vec::new();
        self.rules.retain(|existing| {
            let conflicts = existing.targets.iter()
                .any(|t| incoming_keys.contains(&t.resolution_key()));
            if conflicts
            {
                shadowed.extend(existing.target_labels());
                false
            }
            else
            {
                true
            }
        });

        self.rules.push(rule);
        shadowed
    }

    pub fn register_pattern(&mut self, pattern: PatternRule)
    {
        self.patterns.push(pattern);
    }

    pub fn add_target(&mut self, artifact: Artifact)
    {
        self.requested.push(artifact);
    }

    pub fn add_virtual_target(&mut self, name: &str)
    {
        self.requested.push(Artifact::virtual_target(name));
    }

    pub fn current_dir(&self) -> &str
    {
        &self.cwd
    }

    /*  C8 uses this to anchor a child Context at `parent_cwd/subdir`; the
        child keeps no reference to the parent's rules or builders, only
        the path, for resolving its own relative artifacts. */
    pub fn push_subdir(&self, subdir: &str) -> Context
    {
        let child_cwd = if std::path::Path::new(subdir).is_absolute()
        {
            subdir.to_string()
        }
        else
        {
            format!("{}/{}", self.cwd.trim_end_matches('/'), subdir)
        };

        Context
        {
            cwd: child_cwd,
            rules: Vec::new(),
            patterns: Vec::new(),
            requested: Vec::new(),
            parent_cwd: Some(self.cwd.clone()),
        }
    }

    pub fn parent_cwd(&self) -> Option<&str>
    {
        self.parent_cwd.as_deref()
    }
}
