/// A system/user message pair sent as one chat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const TRANSLATE_RULES: &str = "\
Follow these rules:
1. Always include appropriate LIMIT clauses
2. Use exact column names from the schema
3. Include proper sorting (ORDER BY) when relevant
4. Return only a JSON object with:
   - sql_query: the SQL query
   - confidence: high/medium/low
   - explanation: brief explanation of the conversion

Make the query efficient and safe.";

const SAFETY_RULES: &str = "\
Analyze the given SQL query for safety and efficiency.

Consider:
1. SQL injection risks
2. Performance implications
3. Data security
4. Resource usage

Return only a JSON object with:
- is_safe: boolean
- concerns: list of issues
- suggested_fix: optimized safe version";

pub fn translate(question: &str, schema: &str) -> Prompt {
    Prompt {
        system: format!(
            "You are an expert at converting natural language queries to SQL.\n\
             Given the following schema information:\n{schema}\n\n{TRANSLATE_RULES}"
        ),
        user: format!("Convert this natural language query to SQL:\n{question}"),
    }
}

pub fn safety(sql: &str) -> Prompt {
    Prompt {
        system: SAFETY_RULES.to_string(),
        user: sql.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_embeds_schema_and_question() {
        let prompt = translate("top 5 dogs", "CREATE TABLE dogs (id int);");
        assert!(prompt.system.contains("CREATE TABLE dogs (id int);"));
        assert!(prompt.system.contains("LIMIT"));
        assert!(prompt.system.contains("sql_query"));
        assert!(prompt.user.ends_with("top 5 dogs"));
    }

    #[test]
    fn safety_sends_query_verbatim() {
        let prompt = safety("SELECT 1");
        assert_eq!(prompt.user, "SELECT 1");
        assert!(prompt.system.contains("suggested_fix"));
    }
}
