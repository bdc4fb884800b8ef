use serde_json::{Value, json};

/// One named template `u` applied to `$.user`.
pub fn user_spec() -> Value {
    json!({
        "templates": [{
            "name": "u",
            "output": { "id": "$.id", "full": { "expr": "concat($.first,' ',$.last)" } }
        }],
        "root": { "user": { "apply": "u", "from": "$.user" } }
    })
}

/// An article with a nested author and a list of tags.
pub fn article_spec() -> Value {
    json!({
        "templates": [
            {
                "name": "tag",
                "output": { "name": "$.name", "slug": { "expr": "$.name | lowercase | trim" } }
            },
            {
                "name": "author",
                "output": {
                    "fullName": { "expr": "concat($.firstName, ' ', $.lastName)" },
                    "email": { "expr": "lowercase($.email)" }
                }
            },
            {
                "name": "article",
                "output": {
                    "title": { "expr": "uppercase($.title)" },
                    "summary": { "expr": "$.content | substring(0, 100) | trim" },
                    "author": { "apply": "author", "from": "$.author" },
                    "tags": { "apply": "tag", "from": "$.tags" },
                    "stats": {
                        "wordCount": { "expr": "length($.content)" },
                        "tagCount": { "expr": "length($.tags)" }
                    }
                }
            }
        ],
        "root": { "article": { "apply": "article", "from": "$.article" } }
    })
}

pub fn article_input() -> Value {
    json!({
        "article": {
            "title": "json transformation",
            "content": "This is a detailed article about JSON transformation techniques and best practices for data processing in modern applications.",
            "author": { "firstName": "John", "lastName": "Smith", "email": "John.Smith@Example.com" },
            "tags": [{ "name": "JSON" }, { "name": "Transformation" }, { "name": "JavaScript" }]
        }
    })
}

/// `count` users with an id, a name and a score.
pub fn users(count: usize) -> Value {
    let users: Vec<Value> = (0..count)
        .map(|i| json!({ "id": i, "name": format!("User {}", i), "score": i * 10 }))
        .collect();
    json!({ "users": users })
}
