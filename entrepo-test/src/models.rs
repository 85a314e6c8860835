use chrono::{DateTime, Utc};
use entrepo_data::{keys_into, CollectionDef, Entity, EntityDescriptor, ScalarKind, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blog {
    pub id: i64,
    pub name: String,
    /// Keys of the tags attached to this blog.
    pub tags: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub name: String,
    pub blog_id: i64,
    pub tags: Vec<i64>,
}

pub const BLOG_TAGS: CollectionDef = CollectionDef {
    name: "tags",
    target: "tags",
    target_kind: ScalarKind::Int,
    link_table: "blog_tags",
    owner_column: "blog_id",
    target_column: "tag_id",
};

pub const POST_TAGS: CollectionDef = CollectionDef {
    name: "tags",
    target: "tags",
    target_kind: ScalarKind::Int,
    link_table: "post_tags",
    owner_column: "post_id",
    target_column: "tag_id",
};

fn tag_keys(tags: &[i64]) -> Vec<Value> {
    tags.iter().copied().map(Value::Int).collect()
}

impl Entity for Tag {
    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::builder("tags")
            .key("id", ScalarKind::Int, |t| t.id.into(), |t, v| {
                t.id = v.try_into()?;
                Ok(())
            })
            .field("name", ScalarKind::Text, |t| t.name.clone().into(), |t, v| {
                t.name = v.try_into()?;
                Ok(())
            })
            .build()
    }
}

impl Entity for Blog {
    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::builder("blogs")
            .key("id", ScalarKind::Int, |b| b.id.into(), |b, v| {
                b.id = v.try_into()?;
                Ok(())
            })
            .field("name", ScalarKind::Text, |b| b.name.clone().into(), |b, v| {
                b.name = v.try_into()?;
                Ok(())
            })
            .collection(BLOG_TAGS, |b| tag_keys(&b.tags), |b, keys| {
                b.tags = keys_into(keys)?;
                Ok(())
            })
            .build()
    }
}

impl Entity for Post {
    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::<Self>::builder("posts")
            .key("id", ScalarKind::Int, |p| p.id.into(), |p, v| {
                p.id = v.try_into()?;
                Ok(())
            })
            .field("date", ScalarKind::Timestamp, |p| p.date.into(), |p, v| {
                p.date = v.try_into()?;
                Ok(())
            })
            .field("name", ScalarKind::Text, |p| p.name.clone().into(), |p, v| {
                p.name = v.try_into()?;
                Ok(())
            })
            .field("blog_id", ScalarKind::Int, |p| p.blog_id.into(), |p, v| {
                p.blog_id = v.try_into()?;
                Ok(())
            })
            .collection(POST_TAGS, |p| tag_keys(&p.tags), |p, keys| {
                p.tags = keys_into(keys)?;
                Ok(())
            })
            .build()
    }
}

impl Blog {
    /// Copy with tags in ascending key order, for comparisons that ignore
    /// link-row order.
    pub fn normalized(&self) -> Self {
        let mut blog = self.clone();
        blog.tags.sort_unstable();
        blog
    }
}

impl Post {
    pub fn normalized(&self) -> Self {
        let mut post = self.clone();
        post.tags.sort_unstable();
        post
    }
}
