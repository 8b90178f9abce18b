/// 链表操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkedListError<N> {
    /// 节点已经在某个容器中
    NodeAlreadyInContainer(N),
    /// 指定位置的节点不在容器中
    PositionNodeNotInContainer(N),
    /// 当前节点没有链接到任何容器
    CurrentNodeNotLinked(N),
}

impl<N> From<LinkedListError<N>> for String
where
    N: std::fmt::Debug,
{
    fn from(err: LinkedListError<N>) -> String {
        format!("LinkedListError: {:?}", err)
    }
}

/// 侵入式链表的容器特性
/// # 参数类型
/// - `Node`: 链表节点类型
pub trait LinkedListContainer<Node>: Copy + Eq
where
    Node: LinkedListNode<Ctx = Self::Ctx, Container = Self>,
{
    /// 节点与容器共享的上下文，即存放两者数据的内存池
    type Ctx;

    fn head(self, ctx: &Self::Ctx) -> Option<Node>;
    fn set_head(self, ctx: &mut Self::Ctx, head: Option<Node>);
    fn tail(self, ctx: &Self::Ctx) -> Option<Node>;
    fn set_tail(self, ctx: &mut Self::Ctx, tail: Option<Node>);

    /// 在链表头部添加节点
    fn push_front(self, ctx: &mut Self::Ctx, node: Node) -> Result<(), LinkedListError<Node>> {
        if node.container(ctx).is_some() {
            return Err(LinkedListError::NodeAlreadyInContainer(node));
        }

        if let Some(head) = self.head(ctx) {
            head.insert_before(ctx, node)
                .unwrap_or_else(|_| unreachable!());
        } else {
            self.set_head(ctx, Some(node));
            self.set_tail(ctx, Some(node));
            node.set_container(ctx, Some(self));
        }

        Ok(())
    }

    /// 在链表尾部添加节点
    fn push_back(self, ctx: &mut Self::Ctx, node: Node) -> Result<(), LinkedListError<Node>> {
        if node.container(ctx).is_some() {
            return Err(LinkedListError::NodeAlreadyInContainer(node));
        }

        if let Some(tail) = self.tail(ctx) {
            tail.insert_after(ctx, node)
                .unwrap_or_else(|_| unreachable!());
        } else {
            self.set_head(ctx, Some(node));
            self.set_tail(ctx, Some(node));
            node.set_container(ctx, Some(self));
        }

        Ok(())
    }

    /// 创建双端迭代器
    fn iter(self, ctx: &Self::Ctx) -> LinkedListIterator<Node> {
        LinkedListIterator {
            ctx,
            curr_forward: self.head(ctx),
            curr_backward: self.tail(ctx),
        }
    }
}

/// 侵入式链表的节点特性
pub trait LinkedListNode: Copy + Eq {
    /// 存放该节点的容器类型
    type Container: LinkedListContainer<Self, Ctx = Self::Ctx>;

    /// 访问数据的上下文类型
    type Ctx;

    fn succ(self, ctx: &Self::Ctx) -> Option<Self>;

    fn pre(self, ctx: &Self::Ctx) -> Option<Self>;

    fn container(self, ctx: &Self::Ctx) -> Option<Self::Container>;

    fn set_succ(self, ctx: &mut Self::Ctx, succ: Option<Self>);

    fn set_pre(self, ctx: &mut Self::Ctx, pre: Option<Self>);

    fn set_container(self, ctx: &mut Self::Ctx, container: Option<Self::Container>);

    /// 在当前节点之后插入节点
    fn insert_after(self, ctx: &mut Self::Ctx, node: Self) -> Result<(), LinkedListError<Self>> {
        if self.container(ctx).is_none() {
            return Err(LinkedListError::CurrentNodeNotLinked(self));
        }

        if node.container(ctx).is_some() {
            return Err(LinkedListError::NodeAlreadyInContainer(node));
        }

        if let Some(succ) = self.succ(ctx) {
            succ.set_pre(ctx, Some(node));
            node.set_succ(ctx, Some(succ));
        }

        node.set_pre(ctx, Some(self));
        self.set_succ(ctx, Some(node));

        match self.container(ctx) {
            Some(container) => {
                if container.tail(ctx) == Some(self) {
                    container.set_tail(ctx, Some(node));
                }
            }
            None => unreachable!(),
        }
        node.set_container(ctx, self.container(ctx));

        Ok(())
    }

    /// 在当前节点之前插入节点
    fn insert_before(self, ctx: &mut Self::Ctx, node: Self) -> Result<(), LinkedListError<Self>> {
        if self.container(ctx).is_none() {
            return Err(LinkedListError::CurrentNodeNotLinked(self));
        }

        if node.container(ctx).is_some() {
            return Err(LinkedListError::NodeAlreadyInContainer(node));
        }

        if let Some(pre) = self.pre(ctx) {
            pre.set_succ(ctx, Some(node));
            node.set_pre(ctx, Some(pre));
        }

        node.set_succ(ctx, Some(self));
        self.set_pre(ctx, Some(node));

        match self.container(ctx) {
            Some(container) => {
                if container.head(ctx) == Some(self) {
                    container.set_head(ctx, Some(node));
                }
            }
            None => unreachable!(),
        }

        node.set_container(ctx, self.container(ctx));

        Ok(())
    }

    /// 将节点从链表中摘除，但不从Arena中释放
    fn unlink(self, ctx: &mut Self::Ctx) {
        let pre = self.pre(ctx);
        let succ = self.succ(ctx);

        if let Some(pre) = pre {
            pre.set_succ(ctx, succ);
        }

        if let Some(succ) = succ {
            succ.set_pre(ctx, pre);
        }

        if let Some(container) = self.container(ctx) {
            if container.head(ctx) == Some(self) {
                container.set_head(ctx, succ);
            }

            if container.tail(ctx) == Some(self) {
                container.set_tail(ctx, pre);
            }
        }

        self.set_pre(ctx, None);
        self.set_succ(ctx, None);
        self.set_container(ctx, None);
    }
}

/// 链表的双端迭代器
pub struct LinkedListIterator<'a, T: LinkedListNode> {
    ctx: &'a T::Ctx,
    curr_forward: Option<T>,
    curr_backward: Option<T>,
}

impl<'a, T: LinkedListNode> Iterator for LinkedListIterator<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let curr = self.curr_forward;
        self.curr_forward = curr.and_then(|node| node.succ(self.ctx));
        curr
    }
}

impl<'a, T: LinkedListNode> DoubleEndedIterator for LinkedListIterator<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let curr = self.curr_backward;
        self.curr_backward = curr.and_then(|node| node.pre(self.ctx));
        curr
    }
}
